//! On-disk layout of the vault under an application data root.
//!
//! ```text
//! vault/vault.enc          encrypted container
//! vault/salt.bin           KDF salt
//! vault/photos/<id>.enc    encrypted photos
//! vault/backups/           pre-import backups
//! runtime/db.sqlite        working database, only while unlocked
//! sync/state.json          per-device sync state
//! sync/outbox/             exported snapshot packages
//! ```

use std::path::{Path, PathBuf};

use tokio::fs;

/// Extension of encrypted photo blobs.
pub const PHOTO_EXT: &str = "enc";

/// Marker inserted into quarantined file names by `recover`.
pub const QUARANTINE_MARKER: &str = ".corrupt.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultLayout {
    root: PathBuf,
}

impl VaultLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &mylife_config::MyLifeConfig) -> Self {
        Self::new(mylife_config::resolve_data_dir(config))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vault_dir(&self) -> PathBuf {
        self.root.join("vault")
    }

    pub fn container(&self) -> PathBuf {
        self.vault_dir().join("vault.enc")
    }

    pub fn salt(&self) -> PathBuf {
        self.vault_dir().join("salt.bin")
    }

    pub fn photos_dir(&self) -> PathBuf {
        self.vault_dir().join("photos")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.vault_dir().join("backups")
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.root.join("runtime")
    }

    pub fn working_db(&self) -> PathBuf {
        self.runtime_dir().join("db.sqlite")
    }

    /// SQLite sidecar files that may sit next to the working database.
    pub fn working_db_sidecars(&self) -> [PathBuf; 3] {
        let runtime = self.runtime_dir();
        [
            runtime.join("db.sqlite-journal"),
            runtime.join("db.sqlite-wal"),
            runtime.join("db.sqlite-shm"),
        ]
    }

    pub fn sync_dir(&self) -> PathBuf {
        self.root.join("sync")
    }

    pub fn sync_state(&self) -> PathBuf {
        self.sync_dir().join("state.json")
    }

    pub fn outbox_dir(&self) -> PathBuf {
        self.sync_dir().join("outbox")
    }

    /// Create every directory in the layout.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            self.vault_dir(),
            self.photos_dir(),
            self.backups_dir(),
            self.runtime_dir(),
            self.sync_dir(),
            self.outbox_dir(),
        ] {
            fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_layout() {
        let layout = VaultLayout::new("/data");
        assert_eq!(layout.container(), PathBuf::from("/data/vault/vault.enc"));
        assert_eq!(layout.salt(), PathBuf::from("/data/vault/salt.bin"));
        assert_eq!(layout.photos_dir(), PathBuf::from("/data/vault/photos"));
        assert_eq!(layout.backups_dir(), PathBuf::from("/data/vault/backups"));
        assert_eq!(layout.working_db(), PathBuf::from("/data/runtime/db.sqlite"));
        assert_eq!(layout.sync_state(), PathBuf::from("/data/sync/state.json"));
    }

    #[test]
    fn from_config_uses_data_dir() {
        let config = mylife_config::MyLifeConfig {
            data_dir: Some(PathBuf::from("/srv/mylife")),
            ..Default::default()
        };
        assert_eq!(VaultLayout::from_config(&config).root(), Path::new("/srv/mylife"));
    }
}
