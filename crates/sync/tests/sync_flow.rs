#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Two devices exchanging snapshots through a shared folder.

use std::{path::Path, sync::Arc};

use {
    mylife_sync::{
        ConflictStrategy, FileStore, FolderRemote, ImportOutcome, Resolution, SyncError,
        SyncService, SyncStateStore, hash, package,
    },
    mylife_vault::{KdfParams, Vault, VaultError, VaultLayout, VaultMode},
    tempfile::TempDir,
};

const PIN: &str = "1234";

struct Device {
    vault: Vault,
    sync: SyncService,
}

impl Device {
    fn new(root: &Path, cloud: &Path) -> Self {
        let vault =
            Vault::new(VaultLayout::new(root)).with_kdf_params(KdfParams { iterations: 1_000 });
        let store = Arc::new(FileStore::new(vault.layout().sync_state()));
        let sync = SyncService::for_vault(&vault, store, Arc::new(FolderRemote::new(cloud)));
        Self { vault, sync }
    }

    /// Unlock and lock again; re-encryption alone changes the container bytes.
    async fn edit(&self) {
        self.vault.unlock(PIN).await.unwrap();
        self.vault.lock().await.unwrap();
    }

    fn container_hash(&self) -> String {
        hash::sha256_hex(&std::fs::read(self.vault.layout().container()).unwrap())
    }

    async fn baseline(&self) -> Option<String> {
        self.sync.status().await.unwrap().state.last_sync_hash
    }
}

fn devices(tmp: &TempDir) -> (Device, Device) {
    let cloud = tmp.path().join("cloud");
    (
        Device::new(&tmp.path().join("a"), &cloud),
        Device::new(&tmp.path().join("b"), &cloud),
    )
}

#[tokio::test]
async fn pushed_vault_opens_on_second_device() {
    let tmp = TempDir::new().unwrap();
    let (a, b) = devices(&tmp);

    a.vault.setup(PIN).await.unwrap();
    a.vault.unlock(PIN).await.unwrap();
    let pool = a.vault.connect_working_db().await.unwrap();
    sqlx::query("INSERT INTO schema_info (key, value) VALUES (?, ?)")
        .bind("owner")
        .bind("alice")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;
    let photo = a.vault.store_photo(b"sunset").await.unwrap();
    a.vault.lock().await.unwrap();

    let pushed = a.sync.push().await.unwrap();
    assert_eq!(pushed.snapshot.sync_hash, a.container_hash());
    assert!(a.sync.status().await.unwrap().state.last_push_at.is_some());

    let pulled = b.sync.pull().await.unwrap();
    assert_eq!(pulled.file_name, pushed.remote.file_name);
    assert_eq!(
        pulled.outcome,
        ImportOutcome::Imported {
            sync_hash: pushed.snapshot.sync_hash.clone()
        }
    );
    assert_eq!(b.baseline().await, Some(pushed.snapshot.sync_hash));

    b.vault.unlock(PIN).await.unwrap();
    let pool = b.vault.connect_working_db().await.unwrap();
    let owner: String = sqlx::query_scalar("SELECT value FROM schema_info WHERE key = ?")
        .bind("owner")
        .fetch_one(&pool)
        .await
        .unwrap();
    pool.close().await;
    assert_eq!(owner, "alice");
    assert_eq!(b.vault.read_photo(&photo).await.unwrap(), b"sunset");
}

#[tokio::test]
async fn unchanged_device_accepts_newer_snapshot() {
    let tmp = TempDir::new().unwrap();
    let (a, b) = devices(&tmp);
    a.vault.setup(PIN).await.unwrap();
    a.sync.push().await.unwrap();
    b.sync.pull().await.unwrap();

    a.edit().await;
    let second = a.sync.push().await.unwrap();

    let pulled = b.sync.pull().await.unwrap();
    assert!(!pulled.outcome.is_conflict());
    assert_eq!(b.container_hash(), second.snapshot.sync_hash);
}

#[tokio::test]
async fn diverged_devices_conflict_until_resolved() {
    let tmp = TempDir::new().unwrap();
    let (a, b) = devices(&tmp);
    a.vault.setup(PIN).await.unwrap();
    a.sync.push().await.unwrap();
    b.sync.pull().await.unwrap();

    a.edit().await;
    let remote = a.sync.push().await.unwrap();
    b.edit().await;
    let local = b.container_hash();

    assert_eq!(b.sync.detect_conflicts().await.unwrap().len(), 1);
    let pulled = b.sync.pull().await.unwrap();
    assert_eq!(
        pulled.outcome,
        ImportOutcome::Conflict {
            local_hash: local.clone(),
            remote_hash: remote.snapshot.sync_hash.clone(),
        }
    );
    assert_eq!(b.container_hash(), local);
    let state = b.sync.status().await.unwrap().state;
    assert!(state.last_error.unwrap().starts_with("conflict detected"));

    let snapshot = tmp.path().join("cloud").join(&pulled.file_name);
    let resolution = b
        .sync
        .resolve_conflict(ConflictStrategy::UseRemote, Some(&snapshot))
        .await
        .unwrap();
    assert_eq!(
        resolution,
        Resolution::UsedRemote {
            sync_hash: remote.snapshot.sync_hash.clone()
        }
    );
    assert_eq!(b.container_hash(), remote.snapshot.sync_hash);
    assert!(b.sync.detect_conflicts().await.unwrap().is_empty());
    b.vault.unlock(PIN).await.unwrap();
}

#[tokio::test]
async fn keep_local_makes_local_the_baseline() {
    let tmp = TempDir::new().unwrap();
    let (a, _) = devices(&tmp);
    a.vault.setup(PIN).await.unwrap();
    a.sync.export_snapshot().await.unwrap();
    a.edit().await;
    assert_eq!(a.sync.detect_conflicts().await.unwrap().len(), 1);

    let resolution = a
        .sync
        .resolve_conflict(ConflictStrategy::KeepLocal, None)
        .await
        .unwrap();
    assert_eq!(
        resolution,
        Resolution::KeptLocal {
            sync_hash: Some(a.container_hash())
        }
    );
    assert!(a.sync.detect_conflicts().await.unwrap().is_empty());
}

#[tokio::test]
async fn first_import_replaces_local_vault_and_backs_it_up() {
    let tmp = TempDir::new().unwrap();
    let (a, b) = devices(&tmp);
    a.vault.setup(PIN).await.unwrap();
    b.vault.setup("9999").await.unwrap();
    let replaced = std::fs::read(b.vault.layout().container()).unwrap();

    let exported = a.sync.export_snapshot().await.unwrap();
    let outcome = b.sync.import_snapshot(&exported.path).await.unwrap();
    assert!(!outcome.is_conflict());

    let backups: Vec<_> = std::fs::read_dir(b.vault.layout().backups_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(backups.len(), 2);
    let container_backup = backups
        .iter()
        .find(|n| n.starts_with("vault_backup_"))
        .unwrap();
    assert!(backups.iter().any(|n| n.starts_with("salt_backup_")));
    assert_eq!(
        std::fs::read(b.vault.layout().backups_dir().join(container_backup)).unwrap(),
        replaced
    );

    assert!(matches!(
        b.vault.unlock("9999").await,
        Err(VaultError::InvalidPin)
    ));
    b.vault.unlock(PIN).await.unwrap();
}

#[tokio::test]
async fn import_requires_locked_vault() {
    let tmp = TempDir::new().unwrap();
    let (a, b) = devices(&tmp);
    a.vault.setup(PIN).await.unwrap();
    let exported = a.sync.export_snapshot().await.unwrap();

    b.vault.setup(PIN).await.unwrap();
    b.vault.unlock(PIN).await.unwrap();
    assert!(matches!(
        b.sync.import_snapshot(&exported.path).await,
        Err(SyncError::VaultUnlocked)
    ));
    b.vault.lock().await.unwrap();

    std::fs::remove_file(b.vault.layout().container()).unwrap();
    assert!(b.vault.unlock(PIN).await.is_err());
    assert_eq!(b.vault.state().mode().await, VaultMode::Unavailable);
    assert!(matches!(
        b.sync.import_snapshot(&exported.path).await,
        Err(SyncError::Vault(VaultError::Unavailable))
    ));
}

#[tokio::test]
async fn tampered_package_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let (a, b) = devices(&tmp);
    a.vault.setup(PIN).await.unwrap();
    b.vault.setup(PIN).await.unwrap();
    let before = b.container_hash();

    let container = std::fs::read(a.vault.layout().container()).unwrap();
    let salt = std::fs::read(a.vault.layout().salt()).unwrap();
    let metadata = package::SnapshotMetadata::new("device-a", hash::sha256_hex(b"other bytes"));
    let forged = tmp.path().join("forged.tar.gz");
    package::write_package(&forged, &metadata, &container, &salt, &[]).unwrap();

    assert!(matches!(
        b.sync.import_snapshot(&forged).await,
        Err(SyncError::InvalidPackage { .. })
    ));
    assert!(matches!(
        b.sync.import_snapshot(&tmp.path().join("absent.tar.gz")).await,
        Err(SyncError::InvalidPackage { .. })
    ));
    assert_eq!(b.container_hash(), before);
    assert_eq!(b.baseline().await, None);
}

#[tokio::test]
async fn sync_state_survives_restart() {
    let tmp = TempDir::new().unwrap();
    let cloud = tmp.path().join("cloud");
    let root = tmp.path().join("a");

    let first = Device::new(&root, &cloud);
    first.vault.setup(PIN).await.unwrap();
    let exported = first.sync.export_snapshot().await.unwrap();
    let device_id = first.sync.status().await.unwrap().state.device_id;

    let second = Device::new(&root, &cloud);
    let state = second.sync.status().await.unwrap().state;
    assert_eq!(state.device_id, device_id);
    assert_eq!(state.last_sync_hash, Some(exported.sync_hash));

    let raw = FileStore::new(second.vault.layout().sync_state())
        .load()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(raw, state);
}

#[tokio::test]
async fn importing_the_local_container_is_not_a_conflict() {
    let tmp = TempDir::new().unwrap();
    let (a, _) = devices(&tmp);
    a.vault.setup(PIN).await.unwrap();
    let h0 = a.sync.export_snapshot().await.unwrap().sync_hash;
    a.edit().await;
    let h1 = a.container_hash();
    assert_ne!(h0, h1);

    let container = std::fs::read(a.vault.layout().container()).unwrap();
    let salt = std::fs::read(a.vault.layout().salt()).unwrap();
    let metadata = package::SnapshotMetadata::new("device-a", h1.clone());
    let snapshot = tmp.path().join("same.tar.gz");
    package::write_package(&snapshot, &metadata, &container, &salt, &[]).unwrap();

    let outcome = a.sync.import_snapshot(&snapshot).await.unwrap();
    assert_eq!(outcome, ImportOutcome::Imported {
        sync_hash: h1.clone()
    });
    assert_eq!(a.container_hash(), h1);
    assert_eq!(a.baseline().await, Some(h1));
}

#[tokio::test]
async fn failed_salt_write_restores_previous_container() {
    let tmp = TempDir::new().unwrap();
    let (a, b) = devices(&tmp);
    a.vault.setup(PIN).await.unwrap();
    b.vault.setup("9999").await.unwrap();
    let container_before = b.container_hash();
    let salt_before = std::fs::read(b.vault.layout().salt()).unwrap();
    let exported = a.sync.export_snapshot().await.unwrap();

    // The salt's temp sibling is a directory, so only the salt write fails.
    std::fs::create_dir(b.vault.layout().vault_dir().join("salt.bin.tmp")).unwrap();

    assert!(matches!(
        b.sync.import_snapshot(&exported.path).await,
        Err(SyncError::Io(_))
    ));
    assert_eq!(b.container_hash(), container_before);
    assert_eq!(std::fs::read(b.vault.layout().salt()).unwrap(), salt_before);
    assert_eq!(b.baseline().await, None);
    b.vault.unlock("9999").await.unwrap();
}
