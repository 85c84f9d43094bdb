//! Generation manifests on disk.
//!
//! ```text
//! <root>/
//!   app1/
//!     5.yaml
//!     6.yaml
//!   app2/
//!     app2-1.yaml
//! ```
//!
//! The generation number is the part of the file stem after the last `-`.
//! Only generations present on disk are loaded, so pruned history or a gap
//! is not a missing manifest. A file that cannot be read or parsed is.
//! Service records are decoded one at a time; a bad record is skipped.

use crate::errors::SourceError;
use crate::overrides::RecordScan;
use async_trait::async_trait;
use compiler::collector::{ApplicationManifests, Generation, ServiceRecord};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Everything read from the manifest source.
#[derive(Debug, Default, PartialEq)]
pub struct ManifestScan {
    pub applications: Vec<ApplicationManifests>,
    /// Service records that could not be decoded
    pub undecodable: usize,
    /// Application directories that could not be listed
    pub unreadable_applications: Vec<String>,
}

#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn load(&self) -> Result<ManifestScan, SourceError>;
}

/// A manifest is either a bare list of services or a document with a
/// `services` key.
#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestFile {
    Services(Vec<serde_yaml::Value>),
    Document { services: Vec<serde_yaml::Value> },
}

impl ManifestFile {
    fn into_rows(self) -> Vec<serde_yaml::Value> {
        match self {
            ManifestFile::Services(rows) | ManifestFile::Document { services: rows } => rows,
        }
    }
}

pub struct FilesystemManifestSource {
    root: PathBuf,
}

impl FilesystemManifestSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FilesystemManifestSource { root: root.into() }
    }

    async fn list_generations(dir: &Path) -> std::io::Result<BTreeMap<u64, PathBuf>> {
        let mut files = BTreeMap::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            match generation_number(&path) {
                Some(number) => {
                    files.insert(number, path);
                }
                None => tracing::debug!(path = %path.display(), "Ignoring non-manifest file"),
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl ManifestSource for FilesystemManifestSource {
    async fn load(&self) -> Result<ManifestScan, SourceError> {
        let metadata = tokio::fs::metadata(&self.root)
            .await
            .map_err(|e| SourceError::io(&self.root, e))?;
        if !metadata.is_dir() {
            return Err(SourceError::NotADirectory(self.root.clone()));
        }

        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| SourceError::io(&self.root, e))?;

        let mut scan = ManifestScan::default();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SourceError::io(&self.root, e))?
        {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            // Follows symlinks, unlike the entry's own file type
            match tokio::fs::metadata(&path).await {
                Ok(metadata) if !metadata.is_dir() => continue,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(application = name, error = %e, "Could not read application directory");
                    scan.unreadable_applications.push(name.to_string());
                    continue;
                }
            }

            let files = match Self::list_generations(&path).await {
                Ok(files) => files,
                Err(e) => {
                    tracing::warn!(application = name, error = %e, "Could not read application directory");
                    scan.unreadable_applications.push(name.to_string());
                    continue;
                }
            };

            let mut generations = Vec::with_capacity(files.len());
            for (number, file) in files {
                let manifest = match read_manifest(name, number, &file).await {
                    Some(records) => {
                        scan.undecodable += records.undecodable;
                        Some(records.records)
                    }
                    None => None,
                };
                generations.push(Generation { number, manifest });
            }
            scan.applications.push(ApplicationManifests {
                application: name.to_string(),
                generations,
            });
        }

        scan.applications.sort_by(|a, b| a.application.cmp(&b.application));
        scan.unreadable_applications.sort();
        Ok(scan)
    }
}

fn generation_number(path: &Path) -> Option<u64> {
    let extension = path.extension()?.to_str()?;
    if extension != "yaml" && extension != "yml" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.rsplit('-').next()?.parse().ok()
}

async fn read_manifest(
    application: &str,
    number: u64,
    path: &Path,
) -> Option<RecordScan<ServiceRecord>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(application, generation = number, path = %path.display(), error = %e, "Could not read manifest");
            return None;
        }
    };

    match serde_yaml::from_str::<ManifestFile>(&contents) {
        Ok(manifest) => Some(RecordScan::decode(
            "manifests",
            manifest.into_rows(),
            serde_yaml::from_value,
        )),
        Err(e) => {
            tracing::warn!(application, generation = number, path = %path.display(), error = %e, "Could not parse manifest");
            None
        }
    }
}
