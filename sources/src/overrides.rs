//! Override store adapters.
//!
//! The store is scanned once per run. Records are decoded one at a time so a
//! single malformed row is counted and skipped instead of failing the scan.

use crate::errors::SourceError;
use crate::metrics_defs::RECORDS_UNDECODABLE;
use async_trait::async_trait;
use compiler::collector::OverrideRecord;
use serde::de::DeserializeOwned;
use shared::counter;
use std::path::{Path, PathBuf};
use url::Url;

/// Records decoded from a scan, plus how many rows could not be decoded.
#[derive(Debug, PartialEq)]
pub struct RecordScan<T> {
    pub records: Vec<T>,
    pub undecodable: usize,
}

impl<T> Default for RecordScan<T> {
    fn default() -> Self {
        RecordScan {
            records: Vec::new(),
            undecodable: 0,
        }
    }
}

impl<T: DeserializeOwned> RecordScan<T> {
    /// Decodes every row independently.
    pub(crate) fn decode<R, E>(source: &'static str, rows: Vec<R>, decode: impl Fn(R) -> Result<T, E>) -> Self
    where
        E: std::fmt::Display,
    {
        let mut scan = RecordScan {
            records: Vec::with_capacity(rows.len()),
            undecodable: 0,
        };
        for (index, row) in rows.into_iter().enumerate() {
            match decode(row) {
                Ok(record) => scan.records.push(record),
                Err(e) => {
                    tracing::warn!(source, index, error = %e, "Skipping undecodable record");
                    scan.undecodable += 1;
                }
            }
        }
        if scan.undecodable > 0 {
            counter!(RECORDS_UNDECODABLE, "source" => source).increment(scan.undecodable as u64);
        }
        scan
    }

    /// Rows from a YAML or JSON document holding a list.
    pub(crate) fn from_yaml_list(source: &'static str, path: &Path, contents: &str) -> Result<Self, SourceError> {
        let rows: Vec<serde_yaml::Value> =
            serde_yaml::from_str(contents).map_err(|e| SourceError::parse(path, e))?;
        Ok(Self::decode(source, rows, serde_yaml::from_value))
    }

    /// Rows from a JSON list served over HTTP.
    pub(crate) async fn from_http_list(
        source: &'static str,
        client: &reqwest::Client,
        url: &Url,
    ) -> Result<Self, SourceError> {
        let response = client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let rows: Vec<serde_json::Value> = response.json().await?;
        Ok(Self::decode(source, rows, serde_json::from_value))
    }
}

#[async_trait]
pub trait OverrideStore: Send + Sync {
    async fn scan(&self) -> Result<RecordScan<OverrideRecord>, SourceError>;
}

/// A YAML or JSON file holding a list of override records.
pub struct FilesystemOverrideStore {
    path: PathBuf,
}

impl FilesystemOverrideStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FilesystemOverrideStore { path: path.into() }
    }
}

#[async_trait]
impl OverrideStore for FilesystemOverrideStore {
    async fn scan(&self) -> Result<RecordScan<OverrideRecord>, SourceError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceError::io(&self.path, e))?;
        RecordScan::from_yaml_list("overrides", &self.path, &contents)
    }
}

/// An endpoint answering `GET` with a JSON list of override records.
pub struct HttpOverrideStore {
    client: reqwest::Client,
    url: Url,
}

impl HttpOverrideStore {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        HttpOverrideStore { client, url }
    }
}

#[async_trait]
impl OverrideStore for HttpOverrideStore {
    async fn scan(&self) -> Result<RecordScan<OverrideRecord>, SourceError> {
        RecordScan::from_http_list("overrides", &self.client, &self.url).await
    }
}

/// Used when no override store is configured.
pub struct EmptyOverrideStore;

#[async_trait]
impl OverrideStore for EmptyOverrideStore {
    async fn scan(&self) -> Result<RecordScan<OverrideRecord>, SourceError> {
        Ok(RecordScan::default())
    }
}
