use crate::app::ports::{csv_candidates, TransferGateway};
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Transfer gateway over a mounted drop directory.
pub struct LocalDirGateway {
    root: PathBuf,
}

impl LocalDirGateway {
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(IngestError::transfer(format!(
                "source directory '{}' does not exist",
                root.display()
            )));
        }
        Ok(Self { root })
    }
}

#[async_trait]
impl TransferGateway for LocalDirGateway {
    async fn list_remote_files(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            // Names that are not UTF-8 cannot match the convention; skip them
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        Ok(csv_candidates(names))
    }

    async fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        if name.contains(['/', '\\']) || name == ".." {
            return Err(IngestError::transfer(format!("invalid remote name '{}'", name)));
        }
        Ok(fs::read(self.root.join(name)).await?)
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}
