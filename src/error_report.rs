use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::constants::ERROR_LOG_TIMESTAMP_FORMAT;
use crate::correlation::CorrelationIdGenerator;
use crate::error::Result;

/// One line of the durable error report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub timestamp: NaiveDateTime,
    pub correlation_id: String,
    pub filename: String,
    pub message: String,
}

impl ErrorEntry {
    /// `[2025-01-01 12:00:00] GUID: <id> | File: <name> | Error: <message>`
    pub fn parse_line(line: &str) -> Option<Self> {
        let rest = line.trim_end().strip_prefix('[')?;
        let (timestamp, rest) = rest.split_once("] GUID: ")?;
        let (correlation_id, rest) = rest.split_once(" | File: ")?;
        let (filename, message) = rest.split_once(" | Error: ")?;
        Some(Self {
            timestamp: NaiveDateTime::parse_from_str(timestamp, ERROR_LOG_TIMESTAMP_FORMAT).ok()?,
            correlation_id: correlation_id.to_string(),
            filename: filename.to_string(),
            message: message.to_string(),
        })
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] GUID: {} | File: {} | Error: {}",
            self.timestamp.format(ERROR_LOG_TIMESTAMP_FORMAT),
            self.correlation_id,
            self.filename,
            self.message
        )
    }
}

/// Appends correlation-tagged failure lines to a never-rotated log file.
pub struct ErrorReporter {
    log_path: PathBuf,
    ids: CorrelationIdGenerator,
}

impl ErrorReporter {
    pub fn new<P: Into<PathBuf>>(log_path: P, ids: CorrelationIdGenerator) -> Self {
        Self { log_path: log_path.into(), ids }
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Record a failure and return its correlation id.
    ///
    /// A failed append only produces a warning; the id is still returned so
    /// the operator can quote it.
    pub async fn log(&self, filename: &str, message: &str) -> String {
        let correlation_id = self.ids.generate().await;
        let entry = ErrorEntry {
            timestamp: Local::now().naive_local(),
            correlation_id: correlation_id.clone(),
            filename: single_line(filename),
            message: single_line(message),
        };
        if let Err(e) = self.append(&entry) {
            warn!(path = %self.log_path.display(), error = %e, "failed to append to error report");
        }
        correlation_id
    }

    fn append(&self, entry: &ErrorEntry) -> Result<()> {
        if let Some(parent) = self.log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.log_path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// Keeps each entry on exactly one line
fn single_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

/// Last `tail` parsable entries of an error report; a missing file yields none.
pub fn read_error_entries(path: &Path, tail: usize) -> Result<Vec<ErrorEntry>> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let entries: Vec<ErrorEntry> = content.lines().filter_map(ErrorEntry::parse_line).collect();
    let skip = entries.len().saturating_sub(tail);
    Ok(entries.into_iter().skip(skip).collect())
}
