//! In-memory store for testing.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{Result, store::SyncStateStore, types::SyncState};

/// No persistence: for tests only.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<Option<SyncState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncStateStore for InMemoryStore {
    async fn load(&self) -> Result<Option<SyncState>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.clone())
    }

    async fn save(&self, state: &SyncState) -> Result<()> {
        let mut slot = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(state.clone());
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_empty_then_keeps_last_save() {
        let store = InMemoryStore::new();
        assert!(store.load().await.unwrap().is_none());

        let mut state = SyncState::new();
        store.save(&state).await.unwrap();
        state.last_sync_hash = Some("abc".into());
        store.save(&state).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(state));
    }
}
