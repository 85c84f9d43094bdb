use crate::errors::SourceError;
use crate::overrides::RecordScan;
use async_trait::async_trait;
use compiler::collector::PinnedRouteRecord;
use indexmap::IndexMap;
use std::path::PathBuf;

#[async_trait]
pub trait PinnedRouteSource: Send + Sync {
    async fn load(&self) -> Result<RecordScan<PinnedRouteRecord>, SourceError>;
}

/// A YAML map from prefix to the pinned service:
///
/// ```yaml
/// /app1/:
///   app: app1
///   svc: mfe
///   app_ver: 4
/// ```
pub struct FilesystemPinnedRouteSource {
    path: PathBuf,
}

impl FilesystemPinnedRouteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FilesystemPinnedRouteSource { path: path.into() }
    }
}

#[async_trait]
impl PinnedRouteSource for FilesystemPinnedRouteSource {
    async fn load(&self) -> Result<RecordScan<PinnedRouteRecord>, SourceError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceError::io(&self.path, e))?;

        if contents.trim().is_empty() {
            return Ok(RecordScan::default());
        }
        let rows: IndexMap<String, serde_yaml::Value> =
            serde_yaml::from_str(&contents).map_err(|e| SourceError::parse(&self.path, e))?;

        Ok(RecordScan::decode(
            "pins",
            rows.into_iter().collect(),
            |(prefix, value)| {
                serde_yaml::from_value::<PinnedRouteRecord>(value).map(|mut record| {
                    record.prefix = Some(prefix);
                    record
                })
            },
        ))
    }
}

/// Used when no pinned routes are configured.
pub struct EmptyPinnedRouteSource;

#[async_trait]
impl PinnedRouteSource for EmptyPinnedRouteSource {
    async fn load(&self) -> Result<RecordScan<PinnedRouteRecord>, SourceError> {
        Ok(RecordScan::default())
    }
}
