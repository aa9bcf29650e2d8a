use {mylife_common::FromMessage, mylife_vault::VaultError, thiserror::Error};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("vault not found")]
    NoVault,

    #[error("invalid snapshot: {reason}")]
    InvalidPackage { reason: String },

    #[error("conflict detected: local changes exist (local {local_hash}, remote {remote_hash})")]
    ConflictDetected {
        local_hash: String,
        remote_hash: String,
    },

    #[error("{feature} is not implemented yet")]
    NotImplemented { feature: &'static str },

    #[error("remote snapshot path required")]
    MissingRemotePath,

    #[error("vault must be locked before importing a snapshot")]
    VaultUnlocked,

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("remote store: {message}")]
    Remote { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),

    #[error("{message}")]
    Message { message: String },
}

impl SyncError {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_package(reason: impl Into<String>) -> Self {
        Self::InvalidPackage {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }
}

impl FromMessage for SyncError {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

use SyncError as Error;

pub type Result<T> = std::result::Result<T, SyncError>;

mylife_common::impl_context!();
