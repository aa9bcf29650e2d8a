//! Snapshot synchronization for the encrypted vault.
//!
//! Moves opaque encrypted packages (container, salt, photos) between devices
//! through a [`RemoteStore`]. The plaintext database never leaves the device
//! and nothing here needs the vault key. Divergence is detected by comparing
//! container hashes against the last synced baseline kept in [`SyncState`].

pub mod api;
pub mod error;
pub mod hash;
pub mod package;
pub mod remote;
pub mod service;
pub mod store;
pub mod store_file;
pub mod store_memory;
pub mod types;

pub use {
    api::SyncApi,
    error::{Result, SyncError},
    package::SnapshotMetadata,
    remote::{FolderRemote, NoopRemote, RemoteStore},
    service::SyncService,
    store::SyncStateStore,
    store_file::FileStore,
    store_memory::InMemoryStore,
    types::{
        Conflict, ConflictStrategy, ExportedSnapshot, ImportOutcome, PullReport, PushReport,
        RemoteRef, RemoteStatus, Resolution, SyncState, SyncStatus,
    },
};
