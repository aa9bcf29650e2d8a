/// Config schema types (data root, logging, vault, sync).
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// PBKDF2 iteration count used for new and existing vaults.
pub const DEFAULT_KDF_ITERATIONS: u32 = 200_000;

/// Shortest PIN accepted by `setup`.
pub const DEFAULT_MIN_PIN_LENGTH: usize = 4;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MyLifeConfig {
    /// Application data root. Falls back to the platform data dir.
    pub data_dir: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub vault: VaultConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `mylife_vault=debug`.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Changing this makes existing vaults undecryptable.
    pub kdf_iterations: u32,
    pub min_pin_length: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            min_pin_length: DEFAULT_MIN_PIN_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub remote: RemoteConfig,
}

/// Where pushed snapshots go.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RemoteConfig {
    /// Remote sync disabled; push/pull fail with "not configured".
    #[default]
    None,
    /// A directory, typically one mirrored by a desktop cloud client.
    Folder { path: PathBuf },
}
