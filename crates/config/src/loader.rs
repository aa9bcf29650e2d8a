use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::schema::MyLifeConfig;

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["mylife.toml", "mylife.yaml", "mylife.yml", "mylife.json"];

const ENV_DATA_DIR: &str = "MYLIFE_DATA_DIR";
const ENV_LOG_LEVEL: &str = "MYLIFE_LOG_LEVEL";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<MyLifeConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply env overrides.
///
/// Search order:
/// 1. `./mylife.{toml,yaml,yml,json}` (working directory)
/// 2. `<config dir>/mylife.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `MyLifeConfig::default()` when nothing is found or the file
/// does not parse.
pub fn discover_and_load() -> MyLifeConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                MyLifeConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            MyLifeConfig::default()
        },
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    config
}

/// Apply `MYLIFE_*` overrides using `lookup` (normally `std::env::var`).
pub fn apply_env_overrides(config: &mut MyLifeConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
        config.data_dir = Some(PathBuf::from(dir));
    }
    if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
        config.logging.level = level;
    }
}

/// The user-global config directory.
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().to_path_buf())
}

/// Application data root: `data_dir` from config, else the platform data dir,
/// else `./mylife-data`.
pub fn resolve_data_dir(config: &MyLifeConfig) -> PathBuf {
    if let Some(dir) = &config.data_dir {
        return dir.clone();
    }
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("mylife-data"))
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "mylife")
}

fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<MyLifeConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
