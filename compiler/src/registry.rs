//! Service-platform registry snapshot.
//!
//! The registry tells the resolver how a deployment is hosted. Entries are
//! keyed by service name (`app/svc@ver`) at the source and normalized to
//! deployment identifiers on insert.

use crate::model::DeploymentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// A container service reachable by its deployment identifier inside the mesh.
    #[default]
    Standard,
    /// A function behind a public TLS hostname.
    Serverless,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub hostname: Option<String>,
    /// Path the route prefix is rewritten to for serverless deployments.
    #[serde(default, alias = "rewrite")]
    pub path_rewrite: Option<String>,
}

impl PlatformInfo {
    pub fn standard() -> Self {
        PlatformInfo::default()
    }

    pub fn serverless(hostname: impl Into<String>) -> Self {
        PlatformInfo {
            platform: Platform::Serverless,
            hostname: Some(hostname.into()),
            path_rewrite: None,
        }
    }

    pub fn with_path_rewrite(mut self, path: impl Into<String>) -> Self {
        self.path_rewrite = Some(path.into());
        self
    }
}

/// Read-only view of the registry for one compilation run.
pub trait PlatformRegistry {
    fn lookup(&self, id: &DeploymentId) -> Option<&PlatformInfo>;
}

/// Materialized registry contents.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegistrySnapshot {
    entries: BTreeMap<DeploymentId, PlatformInfo>,
}

impl RegistrySnapshot {
    pub fn insert(&mut self, id: DeploymentId, info: PlatformInfo) {
        self.entries.insert(id, info);
    }

    /// Inserts an entry keyed by its registry name, e.g. `app1/svc@0.0.1`.
    pub fn insert_named(&mut self, name: &str, info: PlatformInfo) {
        self.insert(DeploymentId::normalize(name.trim()), info);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PlatformRegistry for RegistrySnapshot {
    fn lookup(&self, id: &DeploymentId) -> Option<&PlatformInfo> {
        self.entries.get(id)
    }
}

impl<S: AsRef<str>> FromIterator<(S, PlatformInfo)> for RegistrySnapshot {
    fn from_iter<T: IntoIterator<Item = (S, PlatformInfo)>>(iter: T) -> Self {
        let mut snapshot = RegistrySnapshot::default();
        for (name, info) in iter {
            snapshot.insert_named(name.as_ref(), info);
        }
        snapshot
    }
}
