use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::status::StatusSink;

/// Remote file server as seen by the ingestion worker.
#[async_trait]
pub trait TransferGateway: Send + Sync {
    /// Candidate names: `.csv` files only (case-insensitive), sorted, unique
    async fn list_remote_files(&self) -> Result<Vec<String>>;

    async fn fetch(&self, name: &str) -> Result<Vec<u8>>;

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    /// Short label for status lines, e.g. `ftp://host:21/incoming`
    fn describe(&self) -> String;
}

/// Opens a transfer gateway; status lines describe the attempt.
#[async_trait]
pub trait GatewayConnector: Send + Sync {
    async fn connect(&self, sink: &dyn StatusSink) -> Result<Arc<dyn TransferGateway>>;
}

/// Local artifact storage: download staging, archive and quarantine areas.
///
/// Artifacts are addressed by their original file name while staged.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn stage(&self, name: &str, bytes: &[u8]) -> Result<()>;

    async fn archive_exists(&self, archive_name: &str) -> Result<bool>;

    /// Move a staged artifact into the archive under `archive_name`
    async fn archive(&self, name: &str, archive_name: &str) -> Result<()>;

    /// Delete an archived artifact; rolls back an archive that was never recorded
    async fn remove_archived(&self, archive_name: &str) -> Result<()>;

    /// Move a staged artifact into quarantine, keeping its name
    async fn quarantine(&self, name: &str) -> Result<()>;

    /// Remove a staged artifact if one exists
    async fn discard(&self, name: &str) -> Result<()>;
}

/// One strategy for obtaining a correlation id.
#[async_trait]
pub trait CorrelationIdSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self) -> std::result::Result<String, String>;
}

/// Keep `.csv` names (any case), sorted and de-duplicated.
pub fn csv_candidates<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = names
        .into_iter()
        .map(|n| n.trim_end_matches(['\r', '\n']).to_string())
        .filter(|n| {
            n.len() >= 4
                && n.is_char_boundary(n.len() - 4)
                && n[n.len() - 4..].eq_ignore_ascii_case(".csv")
        })
        .collect();
    out.sort();
    out.dedup();
    out
}
