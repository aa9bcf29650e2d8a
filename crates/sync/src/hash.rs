//! Container fingerprints used for conflict detection.

use std::{io, path::Path};

use {
    sha2::{Digest, Sha256},
    tokio::fs,
};

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Hash of the file at `path`, or `None` if it does not exist.
pub async fn hash_file(path: &Path) -> io::Result<Option<String>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(sha256_hex(&bytes))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digests() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn missing_file_has_no_hash() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(hash_file(&tmp.path().join("vault.enc")).await.unwrap(), None);

        std::fs::write(tmp.path().join("vault.enc"), b"abc").unwrap();
        assert_eq!(
            hash_file(&tmp.path().join("vault.enc")).await.unwrap().as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }
}
