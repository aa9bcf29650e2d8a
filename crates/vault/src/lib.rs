//! PIN-protected encryption at rest for the MyLife data directory.
//!
//! A PBKDF2-derived key encrypts the SQLite working database into a single
//! Fernet container while the vault is locked. The working database exists
//! in plaintext only between [`Vault::unlock`] and [`Vault::lock`].
//! Trait-based [`Cipher`] design allows swapping the encryption backend.

pub mod api;
pub mod archive;
pub mod error;
pub mod export;
pub mod fernet;
pub mod kdf;
pub mod layout;
pub mod photos;
pub mod schema;
pub mod state;
pub mod traits;
pub mod vault;

pub use {
    api::VaultApi,
    error::{Result, VaultError},
    fernet::FernetCipher,
    kdf::KdfParams,
    layout::VaultLayout,
    photos::PhotoId,
    state::{Transition, VaultMode, VaultState},
    traits::Cipher,
    vault::{Vault, VaultStatus},
};
