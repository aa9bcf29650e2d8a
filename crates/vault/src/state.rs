//! Process-wide vault state: mode, held key, working database path.
//!
//! [`VaultState`] is an explicit context object, shared by `Arc` between the
//! vault and every subsystem that gates on it. Mode changes happen only
//! through a [`Transition`], which holds the transition mutex for its whole
//! lifetime, so setup / unlock / lock / recover never interleave. Blob
//! encryption only takes the read side of the inner lock and runs in
//! parallel.

use std::{fmt, path::PathBuf};

use {
    tokio::sync::{Mutex, MutexGuard, RwLock},
    zeroize::Zeroizing,
};

use crate::{
    error::{Result, VaultError},
    kdf::KEY_LEN,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VaultMode {
    /// Container encrypted on disk, no key in memory.
    #[default]
    Locked,
    /// Working database materialized, key held in memory.
    Unlocked,
    /// Structural inconsistency detected; sticky until `recover`.
    Unavailable,
}

impl fmt::Display for VaultMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => write!(f, "LOCKED"),
            Self::Unlocked => write!(f, "UNLOCKED"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
        }
    }
}

#[derive(Default)]
struct Inner {
    mode: VaultMode,
    key: Option<Zeroizing<[u8; KEY_LEN]>>,
    working_path: Option<PathBuf>,
}

impl fmt::Debug for Inner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inner")
            .field("mode", &self.mode)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("working_path", &self.working_path)
            .finish()
    }
}

#[derive(Default)]
pub struct VaultState {
    transitions: Mutex<()>,
    inner: RwLock<Inner>,
}

impl fmt::Debug for VaultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_read() {
            Ok(inner) => f.debug_struct("VaultState").field("inner", &*inner).finish(),
            Err(_) => f.debug_struct("VaultState").finish_non_exhaustive(),
        }
    }
}

impl VaultState {
    /// Fresh state: LOCKED, no key.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mode(&self) -> VaultMode {
        self.inner.read().await.mode
    }

    pub async fn is_unlocked(&self) -> bool {
        self.mode().await == VaultMode::Unlocked
    }

    /// Gate for consumers of plaintext data.
    ///
    /// Returns the working database path while UNLOCKED, `Unavailable` while
    /// UNAVAILABLE and `VaultLocked` otherwise.
    pub async fn require_unlocked(&self) -> Result<PathBuf> {
        let inner = self.inner.read().await;
        match (inner.mode, &inner.working_path) {
            (VaultMode::Unlocked, Some(path)) => Ok(path.clone()),
            (VaultMode::Unavailable, _) => Err(VaultError::Unavailable),
            _ => Err(VaultError::VaultLocked),
        }
    }

    /// Acquire the transition mutex. Waits for any in-flight transition.
    pub async fn begin_transition(&self) -> Transition<'_> {
        Transition {
            state: self,
            _guard: self.transitions.lock().await,
        }
    }

    /// Run `f` with the held key, or fail with `VaultLocked`.
    pub(crate) async fn with_key<T>(
        &self,
        f: impl FnOnce(&[u8; KEY_LEN]) -> Result<T>,
    ) -> Result<T> {
        let inner = self.inner.read().await;
        match (&inner.mode, &inner.key) {
            (VaultMode::Unlocked, Some(key)) => f(key),
            _ => Err(VaultError::VaultLocked),
        }
    }
}

/// Exclusive right to change the vault's mode and files.
pub struct Transition<'a> {
    state: &'a VaultState,
    _guard: MutexGuard<'a, ()>,
}

impl Transition<'_> {
    pub async fn mode(&self) -> VaultMode {
        self.state.mode().await
    }

    pub(crate) async fn publish_unlocked(
        &self,
        key: Zeroizing<[u8; KEY_LEN]>,
        working_path: PathBuf,
    ) {
        let mut inner = self.state.inner.write().await;
        inner.key = Some(key);
        inner.working_path = Some(working_path);
        inner.mode = VaultMode::Unlocked;
    }

    pub(crate) async fn publish_locked(&self) {
        self.publish(VaultMode::Locked).await;
    }

    pub(crate) async fn publish_unavailable(&self) {
        self.publish(VaultMode::Unavailable).await;
    }

    pub(crate) async fn with_key<T>(
        &self,
        f: impl FnOnce(&[u8; KEY_LEN]) -> Result<T>,
    ) -> Result<T> {
        self.state.with_key(f).await
    }

    async fn publish(&self, mode: VaultMode) {
        let mut inner = self.state.inner.write().await;
        // Dropping the `Zeroizing` wipes the key bytes.
        inner.key = None;
        inner.working_path = None;
        inner.mode = mode;
    }
}
