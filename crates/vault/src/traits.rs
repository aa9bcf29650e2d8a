//! Cipher trait for swappable authenticated encryption backends.

use crate::error::VaultError;

/// Authenticated symmetric encryption of opaque blobs under a 256-bit key.
///
/// Implementations must fail closed: a wrong key or any modified byte of a
/// token yields [`VaultError::InvalidToken`], never altered plaintext. Wrong
/// PIN detection relies on this, since the derived key is never checked on
/// its own.
pub trait Cipher: Send + Sync {
    /// Format identifier carried inside every token.
    fn version_tag(&self) -> u8;

    /// Encrypt `plaintext` into a self-describing token.
    fn encrypt(&self, key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, VaultError>;

    /// Decrypt a token previously produced by [`encrypt`](Self::encrypt).
    fn decrypt(&self, key: &[u8; 32], token: &[u8]) -> Result<Vec<u8>, VaultError>;
}
