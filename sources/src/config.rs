use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Empty path for {0}")]
    EmptyPath(&'static str),

    #[error("Unsupported URL scheme for {0}: {1}")]
    UnsupportedScheme(&'static str, String),

    #[error("Timeout cannot be 0 for {0}")]
    ZeroTimeout(&'static str),
}

/// Where generation manifests are read from.
#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum ManifestSourceType {
    /// `<root>/<application>/<generation>.yaml`
    Filesystem { root: PathBuf },
}

/// A list of records served from a file or an HTTP endpoint.
#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum RecordStoreType {
    Filesystem { path: PathBuf },
    Http { url: Url },
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum PinnedRouteSourceType {
    Filesystem { path: PathBuf },
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct SourcesConfig {
    pub manifests: ManifestSourceType,
    /// No override store means no overrides
    #[serde(default)]
    pub overrides: Option<RecordStoreType>,
    #[serde(default)]
    pub pins: Option<PinnedRouteSourceType>,
    /// No registry means every deployment uses the standard template
    #[serde(default)]
    pub registry: Option<RecordStoreType>,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl SourcesConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.manifests {
            ManifestSourceType::Filesystem { root } => check_path("sources.manifests", root)?,
        }
        if let Some(overrides) = &self.overrides {
            overrides.validate("sources.overrides")?;
        }
        if let Some(PinnedRouteSourceType::Filesystem { path }) = &self.pins {
            check_path("sources.pins", path)?;
        }
        if let Some(registry) = &self.registry {
            registry.validate("sources.registry")?;
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout("sources"));
        }
        Ok(())
    }
}

impl RecordStoreType {
    pub fn validate(&self, field: &'static str) -> Result<(), ValidationError> {
        match self {
            RecordStoreType::Filesystem { path } => check_path(field, path),
            RecordStoreType::Http { url } => check_scheme(field, url),
        }
    }
}

/// The edge proxy control plane endpoint.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct SinkConfig {
    pub url: Url,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl SinkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_scheme("sink.url", &self.url)?;
        if self.timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout("sink"));
        }
        Ok(())
    }
}

/// Where the last published artifact is kept between runs.
#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum PublishedStoreType {
    Filesystem { base_dir: PathBuf },
}

impl PublishedStoreType {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            PublishedStoreType::Filesystem { base_dir } => check_path("state.base_dir", base_dir),
        }
    }
}

fn check_path(field: &'static str, path: &std::path::Path) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::EmptyPath(field));
    }
    Ok(())
}

fn check_scheme(field: &'static str, url: &Url) -> Result<(), ValidationError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ValidationError::UnsupportedScheme(field, other.to_string())),
    }
}
