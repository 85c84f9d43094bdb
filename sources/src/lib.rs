//! Adapters that materialize the routing sources into a [`Snapshot`] and
//! deliver compiled configurations to the edge proxy control plane.

pub mod config;
pub mod errors;
pub mod manifests;
pub mod metrics_defs;
pub mod overrides;
pub mod pins;
pub mod published;
pub mod registry;
pub mod sink;

#[cfg(test)]
mod testutils;

use crate::config::{
    ManifestSourceType, PinnedRouteSourceType, PublishedStoreType, RecordStoreType, SourcesConfig,
};
use crate::errors::SourceError;
use crate::manifests::{FilesystemManifestSource, ManifestSource};
use crate::metrics_defs::SOURCE_LOAD_DURATION;
use crate::overrides::{EmptyOverrideStore, FilesystemOverrideStore, HttpOverrideStore, OverrideStore};
use crate::pins::{EmptyPinnedRouteSource, FilesystemPinnedRouteSource, PinnedRouteSource};
use crate::published::{FilesystemPublishedStore, NoopPublishedStore, PublishedStore};
use crate::registry::{EmptyRegistrySource, FilesystemRegistrySource, HttpRegistrySource, RegistrySource};
use compiler::Snapshot;
use shared::histogram;
use std::future::Future;
use std::time::Instant;

/// The source adapters selected by configuration.
pub struct Sources {
    pub manifests: Box<dyn ManifestSource>,
    pub overrides: Box<dyn OverrideStore>,
    pub pins: Box<dyn PinnedRouteSource>,
    pub registry: Box<dyn RegistrySource>,
}

/// A snapshot plus what was skipped while reading it.
#[derive(Debug, Default)]
pub struct LoadedSnapshot {
    pub snapshot: Snapshot,
    pub undecodable_records: usize,
    /// Applications whose manifests could not be listed at all
    pub unreadable_applications: Vec<String>,
}

impl Sources {
    pub fn from_config(config: &SourcesConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let manifests: Box<dyn ManifestSource> = match &config.manifests {
            ManifestSourceType::Filesystem { root } => Box::new(FilesystemManifestSource::new(root)),
        };
        let overrides: Box<dyn OverrideStore> = match &config.overrides {
            None => Box::new(EmptyOverrideStore),
            Some(RecordStoreType::Filesystem { path }) => Box::new(FilesystemOverrideStore::new(path)),
            Some(RecordStoreType::Http { url }) => {
                Box::new(HttpOverrideStore::new(client.clone(), url.clone()))
            }
        };
        let pins: Box<dyn PinnedRouteSource> = match &config.pins {
            None => Box::new(EmptyPinnedRouteSource),
            Some(PinnedRouteSourceType::Filesystem { path }) => {
                Box::new(FilesystemPinnedRouteSource::new(path))
            }
        };
        let registry: Box<dyn RegistrySource> = match &config.registry {
            None => Box::new(EmptyRegistrySource),
            Some(RecordStoreType::Filesystem { path }) => Box::new(FilesystemRegistrySource::new(path)),
            Some(RecordStoreType::Http { url }) => Box::new(HttpRegistrySource::new(client, url.clone())),
        };

        Ok(Sources {
            manifests,
            overrides,
            pins,
            registry,
        })
    }

    /// Reads every source concurrently. The first source that fails aborts
    /// the load.
    pub async fn load(&self) -> Result<LoadedSnapshot, SourceError> {
        let (manifests, overrides, pins, registry) = tokio::try_join!(
            timed("manifests", self.manifests.load()),
            timed("overrides", self.overrides.scan()),
            timed("pins", self.pins.load()),
            timed("registry", self.registry.load()),
        )?;

        let undecodable_records = manifests.undecodable
            + overrides.undecodable
            + pins.undecodable
            + registry.undecodable;
        Ok(LoadedSnapshot {
            snapshot: Snapshot {
                applications: manifests.applications,
                overrides: overrides.records,
                pins: pins.records,
                registry: registry.into_snapshot(),
            },
            undecodable_records,
            unreadable_applications: manifests.unreadable_applications,
        })
    }
}

async fn timed<T>(
    source: &'static str,
    load: impl Future<Output = Result<T, SourceError>>,
) -> Result<T, SourceError> {
    let started = Instant::now();
    let result = load.await;
    histogram!(SOURCE_LOAD_DURATION, "source" => source).record(started.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::error!(source, error = %e, "Could not load source");
    }
    result
}

pub fn published_store(config: Option<&PublishedStoreType>) -> Box<dyn PublishedStore> {
    match config {
        Some(PublishedStoreType::Filesystem { base_dir }) => {
            Box::new(FilesystemPublishedStore::new(base_dir))
        }
        None => Box::new(NoopPublishedStore),
    }
}
