//! Crash-safe file replacement.
//!
//! Every write goes to a sibling `*.tmp` file in the same directory, is
//! fsynced, and is then renamed over the target. Readers observe either the
//! previous file or the complete new one, never a partial write.

use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
};

use {
    chrono::{DateTime, Utc},
    tokio::{fs, io::AsyncWriteExt},
};

/// Atomically replace `path` with `bytes`.
///
/// On unix the file is created with owner-only permissions.
pub async fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = temp_sibling(path);

    if let Err(e) = write_synced(&tmp, bytes).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }

    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }

    sync_parent(path).await;
    Ok(())
}

/// Atomically copy `src` over `dst`.
pub async fn atomic_copy(src: &Path, dst: &Path) -> io::Result<()> {
    let bytes = fs::read(src).await?;
    atomic_write(dst, &bytes).await
}

/// Remove a file, treating "already gone" as success.
pub async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Whether `path` exists. I/O errors count as "does not exist".
pub async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Filesystem-safe UTC timestamp, e.g. `20260114_093012`.
#[must_use]
pub fn timestamp_suffix(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// Return `dir/<stem><ext>`, or `dir/<stem>-N<ext>` for the first `N` that
/// does not exist yet. `ext` includes its leading dot.
pub async fn unused_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let candidate = dir.join(format!("{stem}{ext}"));
    if !exists(&candidate).await {
        return candidate;
    }
    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{stem}-{n}{ext}"));
        if !exists(&candidate).await {
            return candidate;
        }
        n += 1;
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("file"));
    name.push(".tmp");
    path.with_file_name(name)
}

async fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

async fn sync_parent(path: &Path) {
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent()
            && let Ok(dir) = fs::File::open(parent).await
        {
            let _ = dir.sync_all().await;
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}
