//! Durable storage for subtitle artifacts.
//!
//! Writes are staged and published atomically: a failed put leaves nothing
//! visible at the destination.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::WriteError;

/// Reference to a persisted artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub location: String,
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.location)
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist `bytes` under `path`, atomically.
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<ArtifactRef, WriteError>;

    /// Whether an artifact exists under `path`.
    async fn exists(&self, path: &str) -> Result<bool, WriteError>;
}

/// Filesystem-backed storage rooted at a directory.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn destination(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<ArtifactRef, WriteError> {
        let dest = self.destination(path);
        let parent = dest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        std::fs::create_dir_all(&parent)?;

        // Stage in the destination directory so the final rename stays on one
        // filesystem
        let mut staged = tempfile::NamedTempFile::new_in(&parent)
            .map_err(|e| WriteError::PersistFailed(format!("staging failed: {e}")))?;
        staged.write_all(bytes)?;
        staged.flush()?;
        staged
            .persist(&dest)
            .map_err(|e| WriteError::PersistFailed(format!("{}: {}", dest.display(), e.error)))?;

        debug!("Persisted {} bytes to {}", bytes.len(), dest.display());
        Ok(ArtifactRef {
            location: dest.display().to_string(),
        })
    }

    async fn exists(&self, path: &str) -> Result<bool, WriteError> {
        Ok(self.destination(path).exists())
    }
}
