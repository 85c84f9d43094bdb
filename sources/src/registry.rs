//! Service-platform registry adapters.
//!
//! Registry rows are keyed by service name (`app/svc@ver`):
//!
//! ```yaml
//! - name: app1/fn@1.0.0
//!   platform: serverless
//!   hostname: abc.lambda-url.us-east-1.on.aws
//!   rewrite: /api/
//! ```

use crate::errors::SourceError;
use crate::overrides::RecordScan;
use async_trait::async_trait;
use compiler::registry::{PlatformInfo, RegistrySnapshot};
use serde::Deserialize;
use std::path::PathBuf;
use url::Url;

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    #[serde(flatten)]
    pub info: PlatformInfo,
}

impl RecordScan<RegistryEntry> {
    /// Later rows replace earlier rows with the same name.
    pub fn into_snapshot(self) -> RegistrySnapshot {
        self.records
            .into_iter()
            .map(|entry| (entry.name, entry.info))
            .collect()
    }
}

#[async_trait]
pub trait RegistrySource: Send + Sync {
    async fn load(&self) -> Result<RecordScan<RegistryEntry>, SourceError>;
}

pub struct FilesystemRegistrySource {
    path: PathBuf,
}

impl FilesystemRegistrySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FilesystemRegistrySource { path: path.into() }
    }
}

#[async_trait]
impl RegistrySource for FilesystemRegistrySource {
    async fn load(&self) -> Result<RecordScan<RegistryEntry>, SourceError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceError::io(&self.path, e))?;
        RecordScan::from_yaml_list("registry", &self.path, &contents)
    }
}

pub struct HttpRegistrySource {
    client: reqwest::Client,
    url: Url,
}

impl HttpRegistrySource {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        HttpRegistrySource { client, url }
    }
}

#[async_trait]
impl RegistrySource for HttpRegistrySource {
    async fn load(&self) -> Result<RecordScan<RegistryEntry>, SourceError> {
        RecordScan::from_http_list("registry", &self.client, &self.url).await
    }
}

/// Every deployment falls back to the standard cluster template.
pub struct EmptyRegistrySource;

#[async_trait]
impl RegistrySource for EmptyRegistrySource {
    async fn load(&self) -> Result<RecordScan<RegistryEntry>, SourceError> {
        Ok(RecordScan::default())
    }
}
