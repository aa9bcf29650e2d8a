//! Remote snapshot storage.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use {
    async_trait::async_trait,
    mylife_common::fs as vfs,
    mylife_config::RemoteConfig,
    tokio::fs,
    tracing::info,
};

use crate::{
    Result,
    error::SyncError,
    types::{RemoteRef, RemoteStatus},
};

/// File-name prefix of every snapshot package.
pub const SNAPSHOT_PREFIX: &str = "mylife_snapshot_";
/// File-name suffix of every snapshot package.
pub const SNAPSHOT_SUFFIX: &str = ".tar.gz";

/// Where snapshot packages are pushed to and pulled from.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upload the package at `path`.
    async fn upload(&self, path: &Path) -> Result<RemoteRef>;

    /// Download the newest package to `dest`, returning its remote name.
    async fn download_latest(&self, dest: &Path) -> Result<String>;

    async fn status(&self) -> RemoteStatus;
}

/// Build the remote configured under `[sync.remote]`.
pub fn from_config(config: &RemoteConfig) -> Arc<dyn RemoteStore> {
    match config {
        RemoteConfig::None => Arc::new(NoopRemote),
        RemoteConfig::Folder { path } => Arc::new(FolderRemote::new(path.clone())),
    }
}

/// A plain directory, typically one kept in sync by a cloud-drive client.
pub struct FolderRemote {
    dir: PathBuf,
}

impl FolderRemote {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Newest snapshot by modification time; name and collision counter
    /// break ties.
    async fn latest(&self) -> Result<Option<(String, PathBuf)>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut best: Option<(SystemTime, String, PathBuf)> = None;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_snapshot_name(&name) {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            let newer = match &best {
                None => true,
                Some((time, best_name, _)) => {
                    (modified, sort_key(&name)) > (*time, sort_key(best_name))
                },
            };
            if newer {
                best = Some((modified, name, entry.path()));
            }
        }
        Ok(best.map(|(_, name, path)| (name, path)))
    }
}

fn is_snapshot_name(name: &str) -> bool {
    name.starts_with(SNAPSHOT_PREFIX) && name.ends_with(SNAPSHOT_SUFFIX)
}

/// `mylife_snapshot_<ts>-N.tar.gz` sorts after `mylife_snapshot_<ts>.tar.gz`.
fn sort_key(name: &str) -> (&str, u32) {
    let stem = name.strip_suffix(SNAPSHOT_SUFFIX).unwrap_or(name);
    match stem.rsplit_once('-') {
        Some((base, n)) => match n.parse() {
            Ok(n) => (base, n),
            Err(_) => (stem, 0),
        },
        None => (stem, 0),
    }
}

#[async_trait]
impl RemoteStore for FolderRemote {
    async fn upload(&self, path: &Path) -> Result<RemoteRef> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| SyncError::remote(format!("not a file: {}", path.display())))?;
        fs::create_dir_all(&self.dir).await?;

        let stem = file_name
            .strip_suffix(SNAPSHOT_SUFFIX)
            .unwrap_or(file_name.as_str());
        let ext = if file_name.ends_with(SNAPSHOT_SUFFIX) {
            SNAPSHOT_SUFFIX
        } else {
            ""
        };
        let target = vfs::unused_path(&self.dir, stem, ext).await;
        vfs::atomic_copy(path, &target).await?;
        let size_bytes = fs::metadata(&target).await?.len();
        let stored_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(file_name);

        info!(remote = %self.dir.display(), file = %stored_name, size_bytes, "snapshot uploaded");

        Ok(RemoteRef {
            file_id: stored_name.clone(),
            file_name: stored_name,
            size_bytes,
        })
    }

    async fn download_latest(&self, dest: &Path) -> Result<String> {
        let (name, source) = self
            .latest()
            .await?
            .ok_or_else(|| SyncError::remote("no snapshot found in remote folder"))?;
        fs::copy(&source, dest).await?;
        info!(remote = %self.dir.display(), file = %name, "snapshot downloaded");
        Ok(name)
    }

    async fn status(&self) -> RemoteStatus {
        let connected = fs::metadata(&self.dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        let last_backup_name = if connected {
            self.latest().await.ok().flatten().map(|(name, _)| name)
        } else {
            None
        };
        RemoteStatus {
            connected,
            last_backup_name,
        }
    }
}

/// Remote sync is not configured.
pub struct NoopRemote;

#[async_trait]
impl RemoteStore for NoopRemote {
    async fn upload(&self, _path: &Path) -> Result<RemoteRef> {
        Err(SyncError::remote("remote sync is not configured"))
    }

    async fn download_latest(&self, _dest: &Path) -> Result<String> {
        Err(SyncError::remote("remote sync is not configured"))
    }

    async fn status(&self) -> RemoteStatus {
        RemoteStatus::default()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        std::time::{Duration, UNIX_EPOCH},
        tempfile::TempDir,
    };

    fn touch(path: &Path, body: &[u8], secs: u64) {
        std::fs::write(path, body).unwrap();
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[tokio::test]
    async fn upload_keeps_name_and_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("mylife_snapshot_20260101_120000.tar.gz");
        std::fs::write(&local, b"package").unwrap();
        let remote = FolderRemote::new(tmp.path().join("cloud"));

        let first = remote.upload(&local).await.unwrap();
        assert_eq!(first.file_name, "mylife_snapshot_20260101_120000.tar.gz");
        assert_eq!(first.size_bytes, 7);

        let second = remote.upload(&local).await.unwrap();
        assert_eq!(second.file_name, "mylife_snapshot_20260101_120000-1.tar.gz");
        assert_ne!(first.file_id, second.file_id);
    }

    #[tokio::test]
    async fn download_picks_newest_snapshot() {
        let tmp = TempDir::new().unwrap();
        let cloud = tmp.path().join("cloud");
        std::fs::create_dir_all(&cloud).unwrap();
        touch(&cloud.join("mylife_snapshot_20260101_000000.tar.gz"), b"old", 1_000);
        touch(&cloud.join("mylife_snapshot_20260102_000000.tar.gz"), b"new", 2_000);
        touch(&cloud.join("unrelated.tar.gz"), b"other", 3_000);

        let remote = FolderRemote::new(&cloud);
        let dest = tmp.path().join("pulled.tar.gz");
        let name = remote.download_latest(&dest).await.unwrap();
        assert_eq!(name, "mylife_snapshot_20260102_000000.tar.gz");
        assert_eq!(std::fs::read(&dest).unwrap(), b"new");

        let status = remote.status().await;
        assert!(status.connected);
        assert_eq!(
            status.last_backup_name.as_deref(),
            Some("mylife_snapshot_20260102_000000.tar.gz")
        );
    }

    #[tokio::test]
    async fn collision_suffix_wins_ties() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("mylife_snapshot_20260101_000000.tar.gz"), b"first", 1_000);
        touch(&tmp.path().join("mylife_snapshot_20260101_000000-1.tar.gz"), b"second", 1_000);
        touch(&tmp.path().join("mylife_snapshot_20260101_000000-10.tar.gz"), b"eleventh", 1_000);
        touch(&tmp.path().join("mylife_snapshot_20260101_000000-2.tar.gz"), b"third", 1_000);

        let remote = FolderRemote::new(tmp.path());
        let dest = tmp.path().join("pulled");
        let name = remote.download_latest(&dest).await.unwrap();
        assert_eq!(name, "mylife_snapshot_20260101_000000-10.tar.gz");
    }

    #[tokio::test]
    async fn empty_or_missing_folder() {
        let tmp = TempDir::new().unwrap();
        let remote = FolderRemote::new(tmp.path().join("absent"));
        assert!(!remote.status().await.connected);
        assert!(matches!(
            remote.download_latest(&tmp.path().join("x")).await,
            Err(SyncError::Remote { .. })
        ));
    }

    #[tokio::test]
    async fn noop_remote_refuses() {
        let remote = from_config(&RemoteConfig::None);
        assert!(remote.upload(Path::new("/tmp/x")).await.is_err());
        assert_eq!(remote.status().await, RemoteStatus::default());
    }
}
