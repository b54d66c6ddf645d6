use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{IngestError, Result};

/// Durable set of file names that have already been archived.
///
/// Loaded once at startup and only ever grown. The backing file holds one name
/// per line and is rewritten in sorted order on every `record`. There is a
/// single writer (the batch worker), so no file locking is done.
#[derive(Debug)]
pub struct ProcessedLedger {
    path: PathBuf,
    names: BTreeSet<String>,
}

impl ProcessedLedger {
    /// A missing file is an empty ledger.
    pub fn load<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let names = match fs::read_to_string(&path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => {
                return Err(IngestError::Ledger(format!(
                    "Failed to read ledger '{}': {}",
                    path.display(),
                    e
                )))
            }
        };
        debug!(path = %path.display(), entries = names.len(), "loaded processed-file ledger");
        Ok(Self { path, names })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Add a name and persist the whole ledger. Returns `false` when the name
    /// was already present (nothing is written in that case).
    pub fn record(&mut self, name: &str) -> Result<bool> {
        if self.names.contains(name) {
            return Ok(false);
        }
        let mut next = self.names.clone();
        next.insert(name.to_string());
        write_sorted(&self.path, &next)?;
        self.names = next;
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// Write to a sibling temp file then rename, so the ledger is never half-written.
fn write_sorted(path: &Path, names: &BTreeSet<String>) -> Result<()> {
    let ledger_err = |e: std::io::Error| {
        IngestError::Ledger(format!("Failed to write ledger '{}': {}", path.display(), e))
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(ledger_err)?;
    }
    let tmp = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp).map_err(ledger_err)?;
        for name in names {
            writeln!(file, "{}", name).map_err(ledger_err)?;
        }
        file.sync_all().map_err(ledger_err)?;
    }
    fs::rename(&tmp, path).map_err(ledger_err)?;
    Ok(())
}
