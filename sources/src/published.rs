//! The published store remembers the last configuration the control plane
//! accepted, so unchanged tables are not published again across restarts.

use crate::errors::StoreError;
use compiler::change::PublishedArtifact;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "routes-";
const FILE_EXTENSION: &str = "json";

pub trait PublishedStore: Send + Sync {
    /// The most recently stored artifact, if any.
    fn load_latest(&self) -> Result<Option<PublishedArtifact>, StoreError>;
    fn store(&self, artifact: &PublishedArtifact) -> Result<(), StoreError>;
}

/// Keeps `routes-<version>.json` under a base directory. Only the newest
/// file is retained after a store.
pub struct FilesystemPublishedStore {
    base_dir: PathBuf,
}

impl FilesystemPublishedStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        FilesystemPublishedStore {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, version: u64) -> PathBuf {
        self.base_dir
            .join(format!("{FILE_PREFIX}{version}.{FILE_EXTENSION}"))
    }

    fn versions(&self) -> Result<Vec<u64>, StoreError> {
        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(StoreError::io(&self.base_dir, e)),
        };

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.base_dir, e))?;
            if let Some(version) = artifact_version(&entry.path()) {
                versions.push(version);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }
}

impl PublishedStore for FilesystemPublishedStore {
    fn load_latest(&self) -> Result<Option<PublishedArtifact>, StoreError> {
        let Some(version) = self.versions()?.last().copied() else {
            return Ok(None);
        };
        let path = self.path_for(version);
        let payload = fs::read(&path).map_err(|e| StoreError::io(&path, e))?;
        Ok(Some(PublishedArtifact::new(version, payload)))
    }

    fn store(&self, artifact: &PublishedArtifact) -> Result<(), StoreError> {
        fs::create_dir_all(&self.base_dir).map_err(|e| StoreError::io(&self.base_dir, e))?;

        // Write to a temporary file first so readers never see a partial artifact
        let path = self.path_for(artifact.version);
        let mut file = tempfile::NamedTempFile::new_in(&self.base_dir)
            .map_err(|e| StoreError::io(&self.base_dir, e))?;
        file.write_all(&artifact.payload)
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| StoreError::io(file.path(), e))?;
        file.persist(&path)
            .map_err(|e| StoreError::io(&path, e.error))?;

        for version in self.versions()? {
            if version != artifact.version {
                let stale = self.path_for(version);
                if let Err(e) = fs::remove_file(&stale) {
                    tracing::warn!(path = %stale.display(), error = %e, "Could not remove stale artifact");
                }
            }
        }

        tracing::info!(
            path = %path.display(),
            version = artifact.version,
            bytes = artifact.payload.len(),
            "Stored published artifact"
        );
        Ok(())
    }
}

fn artifact_version(path: &Path) -> Option<u64> {
    if path.extension()?.to_str()? != FILE_EXTENSION {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix(FILE_PREFIX)?
        .parse()
        .ok()
}

/// Forgets everything. Every run publishes.
pub struct NoopPublishedStore;

impl PublishedStore for NoopPublishedStore {
    fn load_latest(&self) -> Result<Option<PublishedArtifact>, StoreError> {
        Ok(None)
    }

    fn store(&self, _artifact: &PublishedArtifact) -> Result<(), StoreError> {
        Ok(())
    }
}
