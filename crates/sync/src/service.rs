//! Snapshot export/import, conflict detection and remote push/pull.
//!
//! Conflict detection is optimistic and hash based: the device remembers
//! the container hash of its last successful sync and refuses an import
//! that would discard local changes made since.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    chrono::Utc,
    mylife_common::fs as vfs,
    mylife_config::SyncConfig,
    mylife_vault::{
        Cipher, Vault, VaultError, VaultLayout, VaultMode, VaultState, layout::PHOTO_EXT,
        photos::list_photo_files,
    },
    tokio::{fs, sync::Mutex},
    tracing::{debug, error, info, warn},
};

use crate::{
    Result,
    error::SyncError,
    hash,
    package::{self, SnapshotMetadata},
    remote::{self, RemoteStore, SNAPSHOT_PREFIX, SNAPSHOT_SUFFIX},
    store::SyncStateStore,
    store_file::FileStore,
    types::{
        Conflict, ConflictStrategy, ExportedSnapshot, ImportOutcome, PullReport, PushReport,
        Resolution, SyncState, SyncStatus, is_conflict,
    },
};

/// The sync engine for one device.
///
/// Shares [`VaultState`] with the vault so file phases never interleave with
/// unlock or lock. Never needs the vault key.
pub struct SyncService {
    layout: VaultLayout,
    vault_state: Arc<VaultState>,
    store: Arc<dyn SyncStateStore>,
    remote: Arc<dyn RemoteStore>,
    state_lock: Mutex<()>,
}

impl SyncService {
    pub fn new(
        layout: VaultLayout,
        vault_state: Arc<VaultState>,
        store: Arc<dyn SyncStateStore>,
        remote: Arc<dyn RemoteStore>,
    ) -> Self {
        Self {
            layout,
            vault_state,
            store,
            remote,
            state_lock: Mutex::new(()),
        }
    }

    /// Sync service for `vault`, sharing its state.
    pub fn for_vault<C: Cipher>(
        vault: &Vault<C>,
        store: Arc<dyn SyncStateStore>,
        remote: Arc<dyn RemoteStore>,
    ) -> Self {
        Self::new(vault.layout().clone(), vault.state(), store, remote)
    }

    /// State in `<data_dir>/sync/state.json`, remote from `config`.
    pub fn from_config<C: Cipher>(vault: &Vault<C>, config: &SyncConfig) -> Self {
        let store = Arc::new(FileStore::new(vault.layout().sync_state()));
        Self::for_vault(vault, store, remote::from_config(&config.remote))
    }

    pub fn layout(&self) -> &VaultLayout {
        &self.layout
    }

    /// Caller must hold `state_lock`.
    async fn load_or_create(&self) -> Result<SyncState> {
        if let Some(state) = self.store.load().await? {
            return Ok(state);
        }
        let state = SyncState::new();
        self.store.save(&state).await?;
        info!(device_id = %state.device_id, "sync state created");
        Ok(state)
    }

    async fn current_state(&self) -> Result<SyncState> {
        let _guard = self.state_lock.lock().await;
        self.load_or_create().await
    }

    async fn update_state(&self, f: impl FnOnce(&mut SyncState)) -> Result<SyncState> {
        let _guard = self.state_lock.lock().await;
        let mut state = self.load_or_create().await?;
        f(&mut state);
        self.store.save(&state).await?;
        Ok(state)
    }

    async fn record_error(&self, error: &SyncError) {
        let message = error.to_string();
        if let Err(e) = self.update_state(|s| s.last_error = Some(message)).await {
            warn!(error = %e, "failed to record sync error");
        }
    }

    pub async fn status(&self) -> Result<SyncStatus> {
        let state = self.current_state().await?;
        Ok(SyncStatus {
            state,
            remote: self.remote.status().await,
        })
    }

    /// Package the encrypted container, salt and photos into `sync/outbox/`.
    ///
    /// Works in every vault state: only encrypted bytes are read.
    pub async fn export_snapshot(&self) -> Result<ExportedSnapshot> {
        let _transition = self.vault_state.begin_transition().await;

        let container = read_vault_file(&self.layout.container()).await?;
        let salt = read_vault_file(&self.layout.salt()).await?;
        let sync_hash = hash::sha256_hex(&container);
        let device_id = self.current_state().await?.device_id;
        let metadata = SnapshotMetadata::new(device_id, sync_hash.clone());
        let photos = list_photo_files(&self.layout.photos_dir()).await?;
        let photo_count = photos.len();

        let outbox = self.layout.outbox_dir();
        fs::create_dir_all(&outbox).await?;
        let stamp = vfs::timestamp_suffix(Utc::now());
        let target =
            vfs::unused_path(&outbox, &format!("{SNAPSHOT_PREFIX}{stamp}"), SNAPSHOT_SUFFIX).await;
        let partial = target.with_extension("partial");

        let written = {
            let partial = partial.clone();
            tokio::task::spawn_blocking(move || {
                package::write_package(&partial, &metadata, &container, &salt, &photos)
            })
            .await?
        };
        if let Err(e) = written {
            let _ = vfs::remove_if_exists(&partial).await;
            return Err(e);
        }
        fs::rename(&partial, &target).await?;
        let size_bytes = fs::metadata(&target).await?.len();

        self.update_state(|s| s.last_sync_hash = Some(sync_hash.clone()))
            .await?;

        info!(
            path = %target.display(),
            sync_hash = %sync_hash,
            size_bytes,
            photos = photo_count,
            "snapshot exported"
        );

        Ok(ExportedSnapshot {
            path: target,
            sync_hash,
            size_bytes,
        })
    }

    /// Import a snapshot package unless it would discard local changes.
    ///
    /// The vault must be LOCKED. On conflict nothing is written.
    pub async fn import_snapshot(&self, path: &Path) -> Result<ImportOutcome> {
        self.import(path, true).await
    }

    async fn import(&self, path: &Path, check_conflicts: bool) -> Result<ImportOutcome> {
        let transition = self.vault_state.begin_transition().await;
        match transition.mode().await {
            VaultMode::Locked => {},
            VaultMode::Unlocked => return Err(SyncError::VaultUnlocked),
            VaultMode::Unavailable => return Err(VaultError::Unavailable.into()),
        }
        if !vfs::exists(path).await {
            return Err(SyncError::invalid_package(format!(
                "snapshot file not found: {}",
                path.display()
            )));
        }

        let sync_dir = self.layout.sync_dir();
        fs::create_dir_all(&sync_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("import-")
            .tempdir_in(&sync_dir)?;
        let extracted = {
            let archive = path.to_path_buf();
            let scratch = scratch.path().to_path_buf();
            tokio::task::spawn_blocking(move || package::extract_package(&archive, &scratch))
                .await??
        };

        let remote_hash = hash::sha256_hex(&extracted.container);
        let local_hash = hash::hash_file(&self.layout.container()).await?;
        let state = self.current_state().await?;

        if check_conflicts && is_conflict(local_hash.as_deref(), &remote_hash, state.baseline()) {
            let local_hash = local_hash.unwrap_or_default();
            warn!(
                local_hash = %local_hash,
                remote_hash = %remote_hash,
                remote_device = %extracted.metadata.device_id,
                "snapshot import refused: local changes since last sync"
            );
            return Ok(ImportOutcome::Conflict {
                local_hash,
                remote_hash,
            });
        }

        self.layout.ensure_dirs().await?;
        let stamp = vfs::timestamp_suffix(Utc::now());
        let container_backup = self
            .backup(&self.layout.container(), &format!("vault_backup_{stamp}"), ".enc")
            .await?;
        self.backup(&self.layout.salt(), &format!("salt_backup_{stamp}"), ".bin")
            .await?;

        vfs::atomic_write(&self.layout.container(), &extracted.container).await?;
        if let Err(e) = vfs::atomic_write(&self.layout.salt(), &extracted.salt).await {
            // A new container with the old salt would look like a wrong PIN.
            self.restore_container(container_backup.as_deref()).await;
            return Err(e.into());
        }

        let photos_dir = self.layout.photos_dir();
        for (id, source) in &extracted.photos {
            vfs::atomic_copy(source, &photos_dir.join(format!("{id}.{PHOTO_EXT}"))).await?;
        }

        self.update_state(|s| {
            s.last_sync_hash = Some(remote_hash.clone());
            s.last_pull_at = Some(Utc::now());
        })
        .await?;
        drop(transition);

        info!(
            sync_hash = %remote_hash,
            remote_device = %extracted.metadata.device_id,
            photos = extracted.photos.len(),
            "snapshot imported"
        );

        Ok(ImportOutcome::Imported {
            sync_hash: remote_hash,
        })
    }

    /// Copy `source` into `vault/backups/` if it exists. Never overwrites.
    async fn backup(&self, source: &Path, stem: &str, ext: &str) -> Result<Option<PathBuf>> {
        if !vfs::exists(source).await {
            return Ok(None);
        }
        let target = vfs::unused_path(&self.layout.backups_dir(), stem, ext).await;
        vfs::atomic_copy(source, &target).await?;
        debug!(path = %target.display(), "backup written");
        Ok(Some(target))
    }

    /// Put back the container saved by [`backup`](Self::backup), or remove
    /// the imported one if there was none.
    async fn restore_container(&self, backup: Option<&Path>) {
        let container = self.layout.container();
        let restored = match backup {
            Some(backup) => vfs::atomic_copy(backup, &container).await,
            None => vfs::remove_if_exists(&container).await,
        };
        match restored {
            Ok(()) => warn!("salt write failed; previous container restored"),
            Err(e) => error!(error = %e, "salt write failed and container restore failed"),
        }
    }

    /// Local divergence from the last synced hash.
    pub async fn detect_conflicts(&self) -> Result<Vec<Conflict>> {
        let _transition = self.vault_state.begin_transition().await;
        let Some(local_hash) = hash::hash_file(&self.layout.container()).await? else {
            return Ok(Vec::new());
        };
        let state = self.current_state().await?;

        Ok(match state.baseline() {
            Some(baseline) if baseline != local_hash => vec![Conflict::VaultModified {
                local_hash,
                last_sync_hash: baseline.to_string(),
            }],
            _ => Vec::new(),
        })
    }

    pub async fn resolve_conflict(
        &self,
        strategy: ConflictStrategy,
        remote_snapshot: Option<&Path>,
    ) -> Result<Resolution> {
        match strategy {
            ConflictStrategy::KeepLocal => {
                let _transition = self.vault_state.begin_transition().await;
                let local_hash = hash::hash_file(&self.layout.container()).await?;
                self.update_state(|s| s.last_sync_hash = local_hash.clone())
                    .await?;
                info!(sync_hash = ?local_hash, "conflict resolved: kept local");
                Ok(Resolution::KeptLocal {
                    sync_hash: local_hash,
                })
            },
            ConflictStrategy::UseRemote => {
                let path = remote_snapshot.ok_or(SyncError::MissingRemotePath)?;
                match self.import(path, false).await? {
                    ImportOutcome::Imported { sync_hash } => {
                        info!(sync_hash = %sync_hash, "conflict resolved: used remote");
                        Ok(Resolution::UsedRemote { sync_hash })
                    },
                    ImportOutcome::Conflict {
                        local_hash,
                        remote_hash,
                    } => Err(SyncError::ConflictDetected {
                        local_hash,
                        remote_hash,
                    }),
                }
            },
            ConflictStrategy::Merge => Err(SyncError::NotImplemented {
                feature: "merge strategy",
            }),
        }
    }

    /// Export a snapshot and upload it.
    pub async fn push(&self) -> Result<PushReport> {
        let result = self.try_push().await;
        match &result {
            Ok(report) => {
                let file_id = report.remote.file_id.clone();
                self.update_state(|s| {
                    s.last_push_at = Some(Utc::now());
                    s.last_sync_file_id = Some(file_id);
                    s.last_error = None;
                })
                .await?;
                info!(file = %report.remote.file_name, "push completed");
            },
            Err(e) => {
                warn!(error = %e, "push failed");
                self.record_error(e).await;
            },
        }
        result
    }

    async fn try_push(&self) -> Result<PushReport> {
        let snapshot = self.export_snapshot().await?;
        let remote = self.remote.upload(&snapshot.path).await?;
        Ok(PushReport { snapshot, remote })
    }

    /// Download the newest remote snapshot and import it.
    pub async fn pull(&self) -> Result<PullReport> {
        let result = self.try_pull().await;
        match &result {
            Ok(report) => match report.outcome.conflict_error() {
                None => {
                    self.update_state(|s| s.last_error = None).await?;
                    info!(file = %report.file_name, "pull completed");
                },
                Some(conflict) => {
                    warn!(file = %report.file_name, "pull stopped by conflict");
                    self.record_error(&conflict).await;
                },
            },
            Err(e) => {
                warn!(error = %e, "pull failed");
                self.record_error(e).await;
            },
        }
        result
    }

    async fn try_pull(&self) -> Result<PullReport> {
        let sync_dir = self.layout.sync_dir();
        fs::create_dir_all(&sync_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("pull-")
            .tempdir_in(&sync_dir)?;
        let dest = scratch.path().join(format!("remote{SNAPSHOT_SUFFIX}"));

        let file_name = self.remote.download_latest(&dest).await?;
        let outcome = self.import(&dest, true).await?;
        Ok(PullReport { file_name, outcome })
    }
}

async fn read_vault_file(path: &Path) -> Result<Vec<u8>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SyncError::NoVault),
        Err(e) => Err(e.into()),
    }
}
