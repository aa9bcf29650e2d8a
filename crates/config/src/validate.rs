//! Semantic checks on a loaded configuration.
//!
//! Parsing already rejects malformed files; this catches values that parse
//! fine but would weaken the vault or break sync.

use crate::schema::{DEFAULT_KDF_ITERATIONS, DEFAULT_MIN_PIN_LENGTH, MyLifeConfig, RemoteConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// "security" or "sync"
    pub category: &'static str,
    /// Dotted path, e.g. "vault.kdf_iterations"
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    fn push(
        &mut self,
        severity: Severity,
        category: &'static str,
        path: &str,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

#[must_use]
pub fn validate(config: &MyLifeConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if config.vault.kdf_iterations < DEFAULT_KDF_ITERATIONS {
        result.push(
            Severity::Error,
            "security",
            "vault.kdf_iterations",
            format!(
                "{} PBKDF2 iterations is below the minimum of {DEFAULT_KDF_ITERATIONS}",
                config.vault.kdf_iterations
            ),
        );
    } else if config.vault.kdf_iterations != DEFAULT_KDF_ITERATIONS {
        result.push(
            Severity::Warning,
            "security",
            "vault.kdf_iterations",
            "non-default iteration count: vaults created elsewhere will not unlock here",
        );
    }

    if config.vault.min_pin_length < DEFAULT_MIN_PIN_LENGTH {
        result.push(
            Severity::Error,
            "security",
            "vault.min_pin_length",
            format!("PINs shorter than {DEFAULT_MIN_PIN_LENGTH} characters are not allowed"),
        );
    }

    if let RemoteConfig::Folder { path } = &config.sync.remote {
        if path.as_os_str().is_empty() {
            result.push(
                Severity::Error,
                "sync",
                "sync.remote.path",
                "folder remote requires a path",
            );
        } else if let Some(data_dir) = &config.data_dir
            && path.starts_with(data_dir)
        {
            result.push(
                Severity::Warning,
                "sync",
                "sync.remote.path",
                "remote folder lives inside the data dir; it will not survive losing this device",
            );
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use {super::*, std::path::PathBuf};

    #[test]
    fn defaults_are_clean() {
        let result = validate(&MyLifeConfig::default());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn weak_kdf_is_an_error() {
        let mut cfg = MyLifeConfig::default();
        cfg.vault.kdf_iterations = 10_000;
        let result = validate(&cfg);
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].path, "vault.kdf_iterations");
    }

    #[test]
    fn stronger_kdf_only_warns() {
        let mut cfg = MyLifeConfig::default();
        cfg.vault.kdf_iterations = 600_000;
        let result = validate(&cfg);
        assert!(!result.has_errors());
        assert_eq!(result.diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn short_pin_policy_rejected() {
        let mut cfg = MyLifeConfig::default();
        cfg.vault.min_pin_length = 2;
        assert!(validate(&cfg).has_errors());
    }

    #[test]
    fn empty_folder_remote_rejected() {
        let mut cfg = MyLifeConfig::default();
        cfg.sync.remote = RemoteConfig::Folder {
            path: PathBuf::new(),
        };
        let result = validate(&cfg);
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].category, "sync");
    }

    #[test]
    fn remote_inside_data_dir_warns() {
        let cfg = MyLifeConfig {
            data_dir: Some(PathBuf::from("/data/mylife")),
            sync: crate::schema::SyncConfig {
                remote: RemoteConfig::Folder {
                    path: PathBuf::from("/data/mylife/remote"),
                },
            },
            ..Default::default()
        };
        let result = validate(&cfg);
        assert!(!result.has_errors());
        assert_eq!(result.diagnostics.len(), 1);
    }
}
