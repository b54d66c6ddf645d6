use crate::app::ports::ArtifactStore;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Which area of the store an artifact currently lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    Staged,
    Archive,
    Quarantine,
}

/// In-memory artifact storage for tests and dry runs
#[derive(Clone, Default)]
pub struct MemoryArtifactStore {
    files: Arc<Mutex<HashMap<(Area, String), Vec<u8>>>>,
    fail_archive: Arc<Mutex<bool>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `archive` call fail
    pub fn fail_archive(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_archive.lock() {
            *flag = fail;
        }
    }

    pub fn get(&self, area: Area, name: &str) -> Option<Vec<u8>> {
        self.lock().ok()?.get(&(area, name.to_string())).cloned()
    }

    /// Sorted names in one area
    pub fn names(&self, area: Area) -> Vec<String> {
        let mut names: Vec<String> = match self.lock() {
            Ok(files) => files.keys().filter(|(a, _)| *a == area).map(|(_, n)| n.clone()).collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<(Area, String), Vec<u8>>>> {
        self.files
            .lock()
            .map_err(|_| IngestError::storage("memory store lock poisoned"))
    }

    fn relocate(&self, name: &str, to: Area, new_name: &str) -> Result<()> {
        let mut files = self.lock()?;
        let bytes = files
            .remove(&(Area::Staged, name.to_string()))
            .ok_or_else(|| IngestError::storage(format!("'{}' is not staged", name)))?;
        files.insert((to, new_name.to_string()), bytes);
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn stage(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.lock()?.insert((Area::Staged, name.to_string()), bytes.to_vec());
        Ok(())
    }

    async fn archive_exists(&self, archive_name: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(&(Area::Archive, archive_name.to_string())))
    }

    async fn archive(&self, name: &str, archive_name: &str) -> Result<()> {
        if self.fail_archive.lock().map(|f| *f).unwrap_or(false) {
            return Err(IngestError::storage("archive area unavailable"));
        }
        self.relocate(name, Area::Archive, archive_name)
    }

    async fn remove_archived(&self, archive_name: &str) -> Result<()> {
        self.lock()?
            .remove(&(Area::Archive, archive_name.to_string()))
            .map(|_| ())
            .ok_or_else(|| IngestError::storage(format!("'{}' is not archived", archive_name)))
    }

    async fn quarantine(&self, name: &str) -> Result<()> {
        self.relocate(name, Area::Quarantine, name)
    }

    async fn discard(&self, name: &str) -> Result<()> {
        self.lock()?.remove(&(Area::Staged, name.to_string()));
        Ok(())
    }
}
