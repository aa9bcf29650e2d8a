//! Configuration loading and validation.
//!
//! Config files: `mylife.toml`, `mylife.yaml`, or `mylife.json`
//! Searched in `./` then the per-user config dir (`~/.config/mylife/` on Linux).
//!
//! `MYLIFE_DATA_DIR` and `MYLIFE_LOG_LEVEL` override the file.

pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config, resolve_data_dir},
    schema::{LoggingConfig, MyLifeConfig, RemoteConfig, SyncConfig, VaultConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
