//! Gzip-compressed tar writer shared by emergency exports and sync snapshots.
//!
//! Synchronous; run it on the blocking pool.

use std::{fs::File, io, path::Path};

use flate2::{Compression, write::GzEncoder};

pub struct ArchiveWriter {
    builder: tar::Builder<GzEncoder<File>>,
}

impl ArchiveWriter {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            builder: tar::Builder::new(GzEncoder::new(file, Compression::default())),
        })
    }

    /// Add an in-memory entry.
    pub fn append_bytes(&mut self, name: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o600);
        header.set_mtime(u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default());
        self.builder.append_data(&mut header, name, bytes)
    }

    /// Add a file from disk under `name`.
    pub fn append_file(&mut self, name: impl AsRef<Path>, source: &Path) -> io::Result<()> {
        self.builder.append_path_with_name(source, name)
    }

    /// Flush the tar trailer and gzip footer and fsync the file.
    pub fn finish(self) -> io::Result<()> {
        let encoder = self.builder.into_inner()?;
        let file = encoder.finish()?;
        file.sync_all()
    }
}
