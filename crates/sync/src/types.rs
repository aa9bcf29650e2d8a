use std::{fmt, path::PathBuf, str::FromStr};

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

use crate::error::SyncError;

/// Per-device sync bookkeeping. Stored in plaintext outside the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub device_id: String,
    #[serde(default)]
    pub last_push_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_pull_at: Option<DateTime<Utc>>,
    /// Hex SHA-256 of the container at the last successful sync.
    #[serde(default)]
    pub last_sync_hash: Option<String>,
    #[serde(default)]
    pub last_sync_file_id: Option<String>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl SyncState {
    /// Fresh state with a new random device id.
    pub fn new() -> Self {
        Self {
            device_id: uuid::Uuid::new_v4().to_string(),
            last_push_at: None,
            last_pull_at: None,
            last_sync_hash: None,
            last_sync_file_id: None,
            last_error: None,
        }
    }

    /// The baseline hash, treating an empty string as unset.
    pub fn baseline(&self) -> Option<&str> {
        self.last_sync_hash.as_deref().filter(|h| !h.is_empty())
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteStatus {
    pub connected: bool,
    pub last_backup_name: Option<String>,
}

/// Handle to an uploaded snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRef {
    pub file_id: String,
    pub file_name: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    #[serde(flatten)]
    pub state: SyncState,
    pub remote: RemoteStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedSnapshot {
    pub path: PathBuf,
    pub sync_hash: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportOutcome {
    Imported {
        sync_hash: String,
    },
    /// Local changes since the last sync; nothing was written.
    Conflict {
        local_hash: String,
        remote_hash: String,
    },
}

impl ImportOutcome {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// The equivalent error, for callers that treat a conflict as failure.
    pub fn conflict_error(&self) -> Option<SyncError> {
        match self {
            Self::Imported { .. } => None,
            Self::Conflict {
                local_hash,
                remote_hash,
            } => Some(SyncError::ConflictDetected {
                local_hash: local_hash.clone(),
                remote_hash: remote_hash.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Conflict {
    VaultModified {
        local_hash: String,
        last_sync_hash: String,
    },
}

impl Conflict {
    pub fn message(&self) -> &'static str {
        match self {
            Self::VaultModified { .. } => "local vault has been modified since last sync",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    KeepLocal,
    UseRemote,
    Merge,
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::KeepLocal => "keep_local",
            Self::UseRemote => "use_remote",
            Self::Merge => "merge",
        })
    }
}

impl FromStr for ConflictStrategy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep_local" => Ok(Self::KeepLocal),
            "use_remote" => Ok(Self::UseRemote),
            "merge" => Ok(Self::Merge),
            other => Err(SyncError::message(format!("invalid strategy: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum Resolution {
    /// The current local container became the new baseline.
    KeptLocal { sync_hash: Option<String> },
    UsedRemote { sync_hash: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushReport {
    pub snapshot: ExportedSnapshot,
    pub remote: RemoteRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullReport {
    pub file_name: String,
    pub outcome: ImportOutcome,
}

/// Whether importing `remote_hash` would discard local changes.
///
/// True only when a local container exists, differs from the remote, and
/// has moved away from the last synced baseline.
pub fn is_conflict(local_hash: Option<&str>, remote_hash: &str, baseline: Option<&str>) -> bool {
    match (local_hash, baseline) {
        (Some(local), Some(baseline)) => local != remote_hash && baseline != local,
        _ => false,
    }
}
