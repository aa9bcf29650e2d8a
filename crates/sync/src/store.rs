//! Persistence trait for per-device sync state.

use async_trait::async_trait;

use crate::{Result, types::SyncState};

/// Persistence backend for [`SyncState`].
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    /// The stored state, or `None` if nothing was saved yet.
    async fn load(&self) -> Result<Option<SyncState>>;
    async fn save(&self, state: &SyncState) -> Result<()>;
}
