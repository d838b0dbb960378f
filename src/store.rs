//! The single persisted wallpaper artifact

use crate::{Error, Result};
use log::debug;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Outcome of a successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub path: PathBuf,
    pub len: usize,
    /// Hex-encoded SHA-256 of the written bytes
    pub sha256: String,
}

/// Handle to the well-known artifact location.
///
/// Writes land in a temporary file next to the artifact and are renamed over
/// it, so a reader either sees the previous image or the new one, never a
/// partial file.
#[derive(Debug, Clone)]
pub struct WallpaperStore {
    path: PathBuf,
}

impl WallpaperStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the artifact
    pub fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Create the artifact directory if it does not exist yet.
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(self.dir())?;
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Current artifact bytes
    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }

    /// Replace the artifact with `bytes`.
    pub async fn write(&self, bytes: Vec<u8>) -> Result<StoredArtifact> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_replacing(&path, &bytes))
            .await
            .map_err(|e| Error::Other(format!("Store task failed: {}", e)))?
    }
}

fn write_replacing(path: &Path, bytes: &[u8]) -> Result<StoredArtifact> {
    let store_err = |source: std::io::Error| Error::StoreWrite { path: path.to_path_buf(), source };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".wallpaper-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(store_err)?;
    tmp.write_all(bytes).map_err(store_err)?;
    tmp.as_file().sync_all().map_err(store_err)?;
    tmp.persist(path).map_err(|e| store_err(e.error))?;

    let sha256 = hex::encode(Sha256::digest(bytes));
    debug!("Wrote {} bytes to {} (sha256 {})", bytes.len(), path.display(), sha256);

    Ok(StoredArtifact {
        path: path.to_path_buf(),
        len: bytes.len(),
        sha256,
    })
}
