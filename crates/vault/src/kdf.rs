//! PBKDF2-HMAC-SHA256 key derivation for PIN → vault key.
//!
//! The 32-byte output is the raw form of a Fernet key: its URL-safe base64
//! encoding is what Python's `cryptography.fernet.Fernet` accepts.

use {rand::RngCore, sha2::Sha256, zeroize::Zeroizing};

use crate::error::Result;

/// Salt length in bytes.
pub const SALT_LEN: usize = 32;

/// Derived key length in bytes.
pub const KEY_LEN: usize = 32;

/// PBKDF2 parameters. The salt is stored on disk; these are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KdfParams {
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: mylife_config::schema::DEFAULT_KDF_ITERATIONS,
        }
    }
}

/// Configured parameters, never weaker than the default.
impl From<&mylife_config::VaultConfig> for KdfParams {
    fn from(config: &mylife_config::VaultConfig) -> Self {
        Self {
            iterations: config
                .kdf_iterations
                .max(mylife_config::schema::DEFAULT_KDF_ITERATIONS),
        }
    }
}

/// Derive a 256-bit key from a PIN and salt. Deterministic and CPU-bound.
pub fn derive_key(pin: &[u8], salt: &[u8], params: &KdfParams) -> Zeroizing<[u8; KEY_LEN]> {
    let mut output = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(pin, salt, params.iterations.max(1), output.as_mut());
    output
}

/// [`derive_key`] on the blocking pool, for async callers.
pub async fn derive_key_blocking(
    pin: Zeroizing<Vec<u8>>,
    salt: Vec<u8>,
    params: KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let key = tokio::task::spawn_blocking(move || derive_key(&pin, &salt, &params)).await?;
    Ok(key)
}

/// Generate a fresh random salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}
