use crate::app::ports::ArtifactStore;
use crate::config::Directories;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Artifact storage on local disk: files are staged in the download
/// directory and moved into the archive or error directory.
pub struct FsArtifactStore {
    download: PathBuf,
    archive: PathBuf,
    errors: PathBuf,
}

impl FsArtifactStore {
    pub fn new(dirs: &Directories) -> Result<Self> {
        dirs.ensure()?;
        Ok(Self {
            download: dirs.download.clone(),
            archive: dirs.archive.clone(),
            errors: dirs.errors.clone(),
        })
    }

    fn staged_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.download.join(plain_name(name)?))
    }
}

// Remote names must not escape the storage directories
fn plain_name(name: &str) -> Result<&str> {
    let p = Path::new(name);
    match p.file_name() {
        Some(f) if f == p.as_os_str() && name != "." && name != ".." => Ok(name),
        _ => Err(IngestError::storage(format!("refusing unsafe file name '{}'", name))),
    }
}

// Rename, falling back to copy+delete when the directories are on different devices
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    fs::copy(from, to).await.map_err(|e| {
        IngestError::storage(format!("failed to move '{}' to '{}': {}", from.display(), to.display(), e))
    })?;
    fs::remove_file(from).await?;
    Ok(())
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn stage(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.staged_path(name)?;
        fs::write(&path, bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "staged download");
        Ok(())
    }

    async fn archive_exists(&self, archive_name: &str) -> Result<bool> {
        Ok(fs::try_exists(self.archive.join(plain_name(archive_name)?)).await?)
    }

    async fn archive(&self, name: &str, archive_name: &str) -> Result<()> {
        let from = self.staged_path(name)?;
        let to = self.archive.join(plain_name(archive_name)?);
        move_file(&from, &to).await
    }

    async fn remove_archived(&self, archive_name: &str) -> Result<()> {
        let path = self.archive.join(plain_name(archive_name)?);
        fs::remove_file(&path).await?;
        debug!(path = %path.display(), "removed archived file");
        Ok(())
    }

    async fn quarantine(&self, name: &str) -> Result<()> {
        let from = self.staged_path(name)?;
        let to = self.errors.join(plain_name(name)?);
        move_file(&from, &to).await
    }

    async fn discard(&self, name: &str) -> Result<()> {
        let path = self.staged_path(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
