use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::OsStr;
use thiserror::Error;

use crate::constants::{FILENAME_DIGITS, FILENAME_EXTENSION, FILENAME_HINT, FILENAME_PREFIX};
use crate::status::StatusSink;

// `[0-9]` rather than `\d`: the regex crate's `\d` matches any Unicode digit
static FILENAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^{}[0-9]{{{}}}\.{}$",
        FILENAME_PREFIX, FILENAME_DIGITS, FILENAME_EXTENSION
    ))
    .expect("filename pattern is a valid regex")
});

/// Why a candidate name was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilenameIssue {
    #[error("Filename must be a string")]
    NotText,
    #[error("Filename cannot be empty")]
    Empty,
    #[error("Filename '{0}' has leading or trailing whitespace")]
    SurroundingWhitespace(String),
    #[error("Filename '{0}' contains non-ASCII characters")]
    NonAscii(String),
    #[error("Filename '{0}' doesn't match pattern: {}", FILENAME_HINT)]
    PatternMismatch(String),
}

/// Check a candidate name against the naming convention.
///
/// The candidate is an `OsStr` because remote listings are not guaranteed to be
/// valid UTF-8; such names are rejected as `NotText`.
pub fn check_filename<N: AsRef<OsStr> + ?Sized>(candidate: &N) -> Result<(), FilenameIssue> {
    let name = candidate.as_ref().to_str().ok_or(FilenameIssue::NotText)?;
    if name.is_empty() {
        return Err(FilenameIssue::Empty);
    }
    if name.trim() != name {
        return Err(FilenameIssue::SurroundingWhitespace(name.to_string()));
    }
    if !name.is_ascii() {
        return Err(FilenameIssue::NonAscii(name.to_string()));
    }
    if !FILENAME_PATTERN.is_match(name) {
        return Err(FilenameIssue::PatternMismatch(name.to_string()));
    }
    Ok(())
}

/// Boolean form of [`check_filename`] that reports its verdict to an optional sink.
pub fn validate_filename<N: AsRef<OsStr> + ?Sized>(candidate: &N, sink: Option<&dyn StatusSink>) -> bool {
    let verdict = check_filename(candidate);
    if let Some(sink) = sink {
        match &verdict {
            Ok(()) => sink.success(&format!(
                "  ✓ Filename '{}' is valid",
                candidate.as_ref().to_string_lossy()
            )),
            Err(issue) => sink.error(&format!("  ✗ {}", issue)),
        }
    }
    verdict.is_ok()
}

/// `CLINICALDATA20250101120000.csv` -> `CLINICALDATA20250101120000`
pub fn strip_extension(name: &str) -> &str {
    let suffix_len = FILENAME_EXTENSION.len() + 1;
    match name.len().checked_sub(suffix_len) {
        Some(cut) if name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(".csv") => &name[..cut],
        _ => name,
    }
}
