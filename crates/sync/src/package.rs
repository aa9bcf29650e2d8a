//! Snapshot package codec.
//!
//! A package is a gzip tar:
//!
//! ```text
//! metadata.json
//! vault.enc
//! salt.bin
//! encrypted_photos/<id>.enc
//! ```
//!
//! Both directions are synchronous; run them on the blocking pool.

use std::{
    fs::File,
    io::{self, Read},
    path::{Component, Path, PathBuf},
};

use {
    chrono::Utc,
    flate2::read::GzDecoder,
    mylife_vault::{PhotoId, archive::ArchiveWriter, layout::PHOTO_EXT},
    serde::{Deserialize, Serialize},
    tracing::{debug, warn},
};

use crate::{
    error::{Result, SyncError},
    hash::sha256_hex,
};

pub const METADATA_FILE: &str = "metadata.json";
pub const CONTAINER_FILE: &str = "vault.enc";
pub const SALT_FILE: &str = "salt.bin";
pub const PHOTOS_DIR: &str = "encrypted_photos";
pub const FORMAT_VERSION: &str = "1.0";

/// Upper bound for a single in-memory entry (container, salt, metadata).
const MAX_ENTRY_BYTES: u64 = 1 << 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub device_id: String,
    /// RFC 3339. Kept as text so packages from older writers still parse.
    pub exported_at: String,
    pub sync_hash: String,
    #[serde(alias = "version", default = "default_format_version")]
    pub format_version: String,
}

fn default_format_version() -> String {
    FORMAT_VERSION.to_string()
}

impl SnapshotMetadata {
    pub fn new(device_id: impl Into<String>, sync_hash: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            exported_at: Utc::now().to_rfc3339(),
            sync_hash: sync_hash.into(),
            format_version: FORMAT_VERSION.to_string(),
        }
    }
}

/// A validated package, with photos unpacked into a scratch directory.
#[derive(Debug)]
pub struct ExtractedPackage {
    pub metadata: SnapshotMetadata,
    pub container: Vec<u8>,
    pub salt: Vec<u8>,
    pub photos: Vec<(PhotoId, PathBuf)>,
}

/// Write a package to `dest`.
pub fn write_package(
    dest: &Path,
    metadata: &SnapshotMetadata,
    container: &[u8],
    salt: &[u8],
    photos: &[(PhotoId, PathBuf)],
) -> Result<()> {
    let mut writer = ArchiveWriter::create(dest)?;
    writer.append_bytes(METADATA_FILE, &serde_json::to_vec_pretty(metadata)?)?;
    writer.append_bytes(CONTAINER_FILE, container)?;
    writer.append_bytes(SALT_FILE, salt)?;
    for (id, path) in photos {
        writer.append_file(photo_entry(id), path)?;
    }
    writer.finish()?;
    Ok(())
}

fn photo_entry(id: &PhotoId) -> PathBuf {
    Path::new(PHOTOS_DIR).join(format!("{id}.{PHOTO_EXT}"))
}

/// Read and validate the package at `archive`.
///
/// Entries with unsafe paths, links and unknown names are skipped. Photos
/// are written below `scratch`.
pub fn extract_package(archive: &Path, scratch: &Path) -> Result<ExtractedPackage> {
    let file = File::open(archive)?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));

    let mut metadata = None;
    let mut container = None;
    let mut salt = None;
    let mut photos = Vec::new();

    let entries = tar
        .entries()
        .map_err(|e| SyncError::invalid_package(format!("unreadable archive: {e}")))?;
    for entry in entries {
        let mut entry =
            entry.map_err(|e| SyncError::invalid_package(format!("unreadable archive: {e}")))?;
        let path = entry.path()?.into_owned();

        if !entry.header().entry_type().is_file() {
            debug!(path = %path.display(), "skipping non-file package entry");
            continue;
        }
        let Some(relative) = sanitize_entry_path(&path) else {
            warn!(path = %path.display(), "skipping unsafe package entry");
            continue;
        };

        match classify(&relative) {
            Some(EntryKind::Metadata) => {
                let bytes = read_bounded(&mut entry)?;
                let parsed: SnapshotMetadata = serde_json::from_slice(&bytes).map_err(|e| {
                    SyncError::invalid_package(format!("unreadable metadata: {e}"))
                })?;
                metadata = Some(parsed);
            },
            Some(EntryKind::Container) => container = Some(read_bounded(&mut entry)?),
            Some(EntryKind::Salt) => salt = Some(read_bounded(&mut entry)?),
            Some(EntryKind::Photo(id)) => {
                let dest = scratch.join(format!("{id}.{PHOTO_EXT}"));
                let mut out = File::create(&dest)?;
                io::copy(&mut entry, &mut out)?;
                out.sync_all()?;
                photos.push((id, dest));
            },
            None => debug!(path = %relative.display(), "skipping unknown package entry"),
        }
    }

    let metadata = metadata.ok_or_else(|| SyncError::invalid_package("missing metadata"))?;
    let container =
        container.ok_or_else(|| SyncError::invalid_package("missing vault container"))?;
    let salt = salt.ok_or_else(|| SyncError::invalid_package("missing salt"))?;

    let actual = sha256_hex(&container);
    if !actual.eq_ignore_ascii_case(metadata.sync_hash.trim()) {
        return Err(SyncError::invalid_package(
            "container does not match metadata hash",
        ));
    }

    photos.sort_by(|a, b| a.0.cmp(&b.0));
    photos.dedup_by(|a, b| a.0 == b.0);

    Ok(ExtractedPackage {
        metadata,
        container,
        salt,
        photos,
    })
}

enum EntryKind {
    Metadata,
    Container,
    Salt,
    Photo(PhotoId),
}

fn classify(relative: &Path) -> Option<EntryKind> {
    let parts: Vec<&str> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();

    match parts.as_slice() {
        [METADATA_FILE] => Some(EntryKind::Metadata),
        [CONTAINER_FILE] => Some(EntryKind::Container),
        [SALT_FILE] => Some(EntryKind::Salt),
        [PHOTOS_DIR, name] => {
            let stem = name.strip_suffix(PHOTO_EXT)?.strip_suffix('.')?;
            PhotoId::parse(stem).ok().map(EntryKind::Photo)
        },
        _ => None,
    }
}

/// `None` for paths that could leave the extraction root.
fn sanitize_entry_path(path: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {},
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

fn read_bounded(reader: &mut impl Read) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader.take(MAX_ENTRY_BYTES + 1).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > MAX_ENTRY_BYTES {
        return Err(SyncError::invalid_package("entry too large"));
    }
    Ok(bytes)
}
