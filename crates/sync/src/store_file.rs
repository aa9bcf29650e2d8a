//! JSON file-backed sync state store with atomic writes.

use std::path::{Path, PathBuf};

use {async_trait::async_trait, mylife_common::fs as vfs, tokio::fs};

use crate::{
    Result,
    error::{Context, SyncError},
    store::SyncStateStore,
    types::SyncState,
};

/// Single JSON document, usually `<data_dir>/sync/state.json`.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SyncStateStore for FileStore {
    async fn load(&self) -> Result<Option<SyncState>> {
        let data = match fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SyncError::Io(e)),
        };
        let state: SyncState = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(Some(state))
    }

    async fn save(&self, state: &SyncState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(state)?;
        vfs::atomic_write(&self.path, &json).await?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, tempfile::TempDir};

    #[tokio::test]
    async fn missing_file_loads_none() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("sync/state.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn round_trip_across_instances() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sync/state.json");

        let mut state = SyncState::new();
        state.last_sync_hash = Some("deadbeef".into());
        state.last_pull_at = Some(chrono::Utc::now());
        FileStore::new(&path).save(&state).await.unwrap();

        let loaded = FileStore::new(&path).load().await.unwrap().unwrap();
        assert_eq!(loaded, state);
        assert!(!tmp.path().join("sync/state.json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let err = FileStore::new(&path).load().await.unwrap_err();
        assert!(err.to_string().contains("state.json"));
    }

    #[tokio::test]
    async fn tolerates_missing_optional_fields() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, br#"{"device_id":"0b0e9c1e-3f7a-4c55-9b57-8d4c1a2b3c4d"}"#).unwrap();

        let state = FileStore::new(&path).load().await.unwrap().unwrap();
        assert_eq!(state.device_id, "0b0e9c1e-3f7a-4c55-9b57-8d4c1a2b3c4d");
        assert!(state.last_sync_hash.is_none());
    }
}
