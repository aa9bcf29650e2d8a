//! Fernet implementation of the [`Cipher`] trait.
//!
//! Token layout before base64url encoding:
//! `[0x80][timestamp: u64 BE][iv: 16][AES-128-CBC(PKCS#7) ciphertext][HMAC-SHA256: 32]`.
//! The 32-byte key splits into a signing half (first 16 bytes) and an
//! encryption half (last 16). Tokens interoperate with Python's
//! `cryptography.fernet`.

use {
    aes::Aes128,
    base64::{Engine, engine::general_purpose::URL_SAFE},
    cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7},
    hmac::{Hmac, Mac},
    rand::RngCore,
    sha2::Sha256,
    zeroize::Zeroizing,
};

use crate::{error::VaultError, traits::Cipher};

/// Fernet version byte.
pub const VERSION_TAG: u8 = 0x80;

const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;
const HMAC_LEN: usize = 32;
/// version + timestamp + iv
const HEADER_LEN: usize = 1 + 8 + IV_LEN;
const MIN_TOKEN_LEN: usize = HEADER_LEN + BLOCK_LEN + HMAC_LEN;

type HmacSha256 = Hmac<Sha256>;
type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

pub struct FernetCipher;

impl FernetCipher {
    fn seal(
        key: &[u8; 32],
        plaintext: &[u8],
        timestamp: u64,
        iv: &[u8; IV_LEN],
    ) -> Result<Vec<u8>, VaultError> {
        let (signing_key, encryption_key) = key.split_at(16);

        let ciphertext = Aes128CbcEnc::new_from_slices(encryption_key, iv)
            .map_err(|_| VaultError::InvalidToken)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut raw = Vec::with_capacity(HEADER_LEN + ciphertext.len() + HMAC_LEN);
        raw.push(VERSION_TAG);
        raw.extend_from_slice(&timestamp.to_be_bytes());
        raw.extend_from_slice(iv);
        raw.extend_from_slice(&ciphertext);

        let mut mac = HmacSha256::new_from_slice(signing_key).map_err(|_| VaultError::InvalidToken)?;
        mac.update(&raw);
        raw.extend_from_slice(&mac.finalize().into_bytes());

        Ok(URL_SAFE.encode(raw).into_bytes())
    }
}

impl Cipher for FernetCipher {
    fn version_tag(&self) -> u8 {
        VERSION_TAG
    }

    fn encrypt(&self, key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
        let mut iv = [0u8; IV_LEN];
        rand::rng().fill_bytes(&mut iv);
        let timestamp = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
        Self::seal(key, plaintext, timestamp, &iv)
    }

    fn decrypt(&self, key: &[u8; 32], token: &[u8]) -> Result<Vec<u8>, VaultError> {
        let raw = URL_SAFE
            .decode(token)
            .map_err(|_| VaultError::InvalidToken)?;
        if raw.len() < MIN_TOKEN_LEN || raw[0] != VERSION_TAG {
            return Err(VaultError::InvalidToken);
        }

        let (signing_key, encryption_key) = key.split_at(16);
        let (signed, tag) = raw.split_at(raw.len() - HMAC_LEN);

        // Authenticate before touching the ciphertext.
        let mut mac = HmacSha256::new_from_slice(signing_key).map_err(|_| VaultError::InvalidToken)?;
        mac.update(signed);
        mac.verify_slice(tag)
            .map_err(|_| VaultError::InvalidToken)?;

        let iv = &signed[HEADER_LEN - IV_LEN..HEADER_LEN];
        let ciphertext = &signed[HEADER_LEN..];
        if ciphertext.len() % BLOCK_LEN != 0 {
            return Err(VaultError::InvalidToken);
        }

        Aes128CbcDec::new_from_slices(encryption_key, iv)
            .map_err(|_| VaultError::InvalidToken)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| VaultError::InvalidToken)
    }
}

/// Encode a raw key as a Fernet key string (URL-safe base64, padded).
pub fn encode_key(key: &[u8; 32]) -> Zeroizing<String> {
    Zeroizing::new(URL_SAFE.encode(key))
}

/// Decode a Fernet key string into raw key bytes.
pub fn decode_key(encoded: &str) -> Result<Zeroizing<[u8; 32]>, VaultError> {
    let bytes = Zeroizing::new(
        URL_SAFE
            .decode(encoded.trim())
            .map_err(|_| VaultError::InvalidToken)?,
    );
    let mut key = Zeroizing::new([0u8; 32]);
    if bytes.len() != key.len() {
        return Err(VaultError::InvalidToken);
    }
    key.copy_from_slice(&bytes);
    Ok(key)
}
