//! Encrypted photo blobs under `vault/photos/<id>.enc`.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use {mylife_common::fs as vfs, tokio::fs, uuid::Uuid};

use crate::{
    error::{Result, VaultError},
    layout::PHOTO_EXT,
    traits::Cipher,
    vault::Vault,
};

/// Identifier of a stored photo: a hyphenated lowercase UUID.
///
/// Parsing rejects anything else, so an id can never name a path outside
/// the photo directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhotoId(String);

impl PhotoId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let uuid = Uuid::try_parse(raw).map_err(|_| VaultError::InvalidPhotoId(raw.to_string()))?;
        let canonical = uuid.hyphenated().to_string();
        if canonical != raw.to_ascii_lowercase() {
            return Err(VaultError::InvalidPhotoId(raw.to_string()));
        }
        Ok(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhotoId {
    type Error = VaultError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PhotoId> for String {
    fn from(id: PhotoId) -> Self {
        id.0
    }
}

impl<C: Cipher> Vault<C> {
    pub fn photo_path(&self, id: &PhotoId) -> PathBuf {
        self.layout()
            .photos_dir()
            .join(format!("{}.{PHOTO_EXT}", id.as_str()))
    }

    /// Encrypt and store a photo. Requires UNLOCKED.
    pub async fn store_photo(&self, bytes: &[u8]) -> Result<PhotoId> {
        let token = self.encrypt_blob(bytes).await?;
        let id = PhotoId::generate();
        fs::create_dir_all(self.layout().photos_dir()).await?;
        vfs::atomic_write(&self.photo_path(&id), &token).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(photo = %id, bytes = bytes.len(), "photo stored");

        Ok(id)
    }

    /// Read and decrypt a stored photo. Requires UNLOCKED.
    pub async fn read_photo(&self, id: &PhotoId) -> Result<Vec<u8>> {
        // Gate first so a locked vault never touches the file.
        self.state().require_unlocked().await?;
        let token = fs::read(self.photo_path(id)).await?;
        self.decrypt_blob(&token).await
    }

    /// Ids of every stored photo, sorted. Files with other names are skipped.
    pub async fn list_photos(&self) -> Result<Vec<PhotoId>> {
        let files = list_photo_files(&self.layout().photos_dir()).await?;
        Ok(files.into_iter().map(|(id, _)| id).collect())
    }
}

/// Every `<id>.enc` file directly inside `dir`, sorted by id.
pub async fn list_photo_files(dir: &Path) -> Result<Vec<(PhotoId, PathBuf)>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(PHOTO_EXT) {
            continue;
        }
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| PhotoId::parse(s).ok())
        {
            files.push((id, path));
        }
    }
    files.sort();
    Ok(files)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{kdf::KdfParams, layout::VaultLayout},
        rstest::rstest,
        tempfile::TempDir,
    };

    #[rstest]
    #[case::traversal("../salt")]
    #[case::absolute("/etc/passwd")]
    #[case::empty("")]
    #[case::not_a_uuid("holiday.jpg")]
    #[case::simple_form("67e5504410b1426f9247bb680e5fe0c8")]
    fn rejects_non_uuid_ids(#[case] raw: &str) {
        assert!(matches!(
            PhotoId::parse(raw),
            Err(VaultError::InvalidPhotoId(_))
        ));
    }

    #[test]
    fn accepts_uppercase_and_normalizes() {
        let id = PhotoId::parse("67E55044-10B1-426F-9247-BB680E5FE0C8").unwrap();
        assert_eq!(id.as_str(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<PhotoId>("\"../../x\"").is_err());
        let id: PhotoId =
            serde_json::from_str("\"67e55044-10b1-426f-9247-bb680e5fe0c8\"").unwrap();
        assert_eq!(id.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
    }

    async fn unlocked(tmp: &TempDir) -> Vault {
        let vault =
            Vault::new(VaultLayout::new(tmp.path())).with_kdf_params(KdfParams { iterations: 1_000 });
        vault.setup("1234").await.unwrap();
        vault.unlock("1234").await.unwrap();
        vault
    }

    #[tokio::test]
    async fn store_and_read_photo() {
        let tmp = TempDir::new().unwrap();
        let vault = unlocked(&tmp).await;

        let id = vault.store_photo(b"\xFF\xD8\xFFjpeg").await.unwrap();
        let path = vault.photo_path(&id);
        assert!(path.starts_with(vault.layout().photos_dir()));
        assert_ne!(std::fs::read(&path).unwrap(), b"\xFF\xD8\xFFjpeg");

        assert_eq!(vault.read_photo(&id).await.unwrap(), b"\xFF\xD8\xFFjpeg");
        assert_eq!(vault.list_photos().await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn photos_survive_lock_cycle() {
        let tmp = TempDir::new().unwrap();
        let vault = unlocked(&tmp).await;
        let id = vault.store_photo(b"beach").await.unwrap();

        vault.lock().await.unwrap();
        assert!(matches!(
            vault.read_photo(&id).await,
            Err(VaultError::VaultLocked)
        ));

        vault.unlock("1234").await.unwrap();
        assert_eq!(vault.read_photo(&id).await.unwrap(), b"beach");
    }

    #[tokio::test]
    async fn list_skips_foreign_files() {
        let tmp = TempDir::new().unwrap();
        let vault = unlocked(&tmp).await;
        let photos = vault.layout().photos_dir();
        std::fs::write(photos.join("notes.txt"), b"x").unwrap();
        std::fs::write(photos.join("garbage.enc"), b"x").unwrap();
        assert!(vault.list_photos().await.unwrap().is_empty());
    }
}
