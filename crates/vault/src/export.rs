//! Emergency export: every encrypted artifact in one archive, no key needed.

use std::path::{Path, PathBuf};

use {mylife_common::fs as vfs, serde::Serialize, tokio::fs};

use crate::{
    archive::ArchiveWriter,
    error::{Result, VaultError},
    layout::{PHOTO_EXT, QUARANTINE_MARKER},
    state::VaultMode,
    traits::Cipher,
    vault::Vault,
};

const APP_NAME: &str = "MyLife";
const NOTE: &str = "Encrypted vault files. Restoring them requires the vault PIN.";

#[derive(Debug, Serialize)]
struct EmergencyMetadata<'a> {
    app_name: &'a str,
    version: &'a str,
    exported_at: String,
    vault_state: VaultMode,
    note: &'a str,
}

impl<C: Cipher> Vault<C> {
    /// Container, salt, photos, backups and quarantined files, sorted.
    ///
    /// Only lists encrypted artifacts; works in any state.
    pub async fn emergency_export_files(&self) -> Result<Vec<PathBuf>> {
        let layout = self.layout();
        let mut files = Vec::new();

        for path in [layout.container(), layout.salt()] {
            if is_file(&path).await {
                files.push(path);
            }
        }

        files.extend(
            list_files(&layout.vault_dir(), |name| name.contains(QUARANTINE_MARKER)).await?,
        );
        files.extend(
            list_files(&layout.photos_dir(), |name| {
                Path::new(name).extension().and_then(|e| e.to_str()) == Some(PHOTO_EXT)
            })
            .await?,
        );
        files.extend(list_files(&layout.backups_dir(), |_| true).await?);

        files.sort();
        Ok(files)
    }

    /// Write a gzip tar of [`emergency_export_files`](Self::emergency_export_files)
    /// into `dest_dir` and return its path.
    pub async fn write_emergency_export(&self, dest_dir: &Path) -> Result<PathBuf> {
        // Keep container and salt consistent with each other while copying.
        let state = self.state();
        let transition = state.begin_transition().await;

        let files = self.emergency_export_files().await?;
        if files.is_empty() {
            return Err(VaultError::NothingToExport);
        }

        let now = chrono::Utc::now();
        let metadata = serde_json::to_vec_pretty(&EmergencyMetadata {
            app_name: APP_NAME,
            version: env!("CARGO_PKG_VERSION"),
            exported_at: now.to_rfc3339(),
            vault_state: transition.mode().await,
            note: NOTE,
        })?;

        fs::create_dir_all(dest_dir).await?;
        let stamp = vfs::timestamp_suffix(now);
        let target = vfs::unused_path(dest_dir, &format!("mylife_emergency_{stamp}"), ".tar.gz").await;
        let partial = target.with_extension("partial");

        let vault_dir = self.layout().vault_dir();
        #[cfg(feature = "tracing")]
        let count = files.len();
        let written = {
            let partial = partial.clone();
            tokio::task::spawn_blocking(move || {
                let mut writer = ArchiveWriter::create(&partial)?;
                writer.append_bytes("metadata.json", &metadata)?;
                for file in &files {
                    let relative = file.strip_prefix(&vault_dir).unwrap_or(file);
                    writer.append_file(Path::new("vault").join(relative), file)?;
                }
                writer.finish()
            })
            .await?
        };
        if let Err(e) = written {
            let _ = vfs::remove_if_exists(&partial).await;
            return Err(e.into());
        }
        fs::rename(&partial, &target).await?;

        #[cfg(feature = "tracing")]
        tracing::info!(path = %target.display(), files = count, "emergency export written");

        Ok(target)
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

/// Regular files directly inside `dir` whose name passes `keep`.
async fn list_files(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if keep(&name.to_string_lossy()) {
            files.push(entry.path());
        }
    }
    Ok(files)
}
