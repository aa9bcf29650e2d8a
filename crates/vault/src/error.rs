//! Vault error types.

/// Errors produced by vault operations.
///
/// Variants never carry key material. `InvalidPin` is deliberately generic:
/// it does not say whether the PIN, the salt or the container is at fault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// `setup` called on a vault that already has a salt.
    #[error("vault already exists")]
    AlreadyExists,

    /// No salt file: the vault was never set up.
    #[error("vault is not initialized")]
    NotInitialized,

    /// Salt present but the encrypted container is gone.
    #[error("vault database not found")]
    MissingContainer,

    /// Lock requested but the working database vanished.
    #[error("working database not found")]
    MissingWorkingDatabase,

    /// The container did not authenticate under the derived key.
    #[error("invalid PIN")]
    InvalidPin,

    /// A token failed authentication or is malformed.
    #[error("invalid token")]
    InvalidToken,

    /// Operation requires an unlocked vault.
    #[error("vault is locked")]
    VaultLocked,

    /// `lock` requested while the vault is not unlocked.
    #[error("vault is not unlocked")]
    NotUnlocked,

    /// `unlock` requested while already unlocked.
    #[error("vault is already unlocked")]
    AlreadyUnlocked,

    /// The vault hit a structural inconsistency; only `recover` clears this.
    #[error("vault is unavailable; recovery required")]
    Unavailable,

    #[error("PIN must be at least {min} characters")]
    PinTooShort { min: usize },

    #[error("invalid photo id: {0}")]
    InvalidPhotoId(String),

    #[error("no vault files found to export")]
    NothingToExport,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, VaultError>;
