//! Route Intent Model
//!
//! The canonical in-memory representation of a routing rule before it is
//! reconciled against the other rules that share its signature.
//!
//! ```text
//! RouteIntent {
//!   prefix: "/app1/svc/"
//!   header_matchers: {X-App-Version: "2"}
//!   target: Single(app1/svc@0.0.2)   ─► cluster "app1-svc-0-0-2"
//! }
//! ```
//!
//! Intents are value objects. They are created by the collector, reduced by
//! the deduplicator and ordered by the sorter within a single compilation run.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Header carrying the calling application's name.
pub const APP_NAME_HEADER: &str = "X-App-Name";
/// Header carrying the calling application's generation number.
pub const APP_VERSION_HEADER: &str = "X-App-Version";

/// Insertion-ordered header name to value map. Matcher order is part of the
/// routing signature, so a hash map is not an option here.
pub type Headers = IndexMap<String, String>;

/// Name of one upstream cluster, derived from a `ServiceDeploymentRef`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentId(String);

impl DeploymentId {
    /// Normalizes a raw name into an identifier. `/`, `@` and `.` become `-`,
    /// which maps a registry name such as `app1/svc@0.0.1` to `app1-svc-0-0-1`.
    pub fn normalize(raw: &str) -> Self {
        DeploymentId(raw.replace(['/', '@', '.'], "-"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One running version of one service of one application.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceDeploymentRef {
    pub application: String,
    pub service: String,
    /// Opaque version string, not guaranteed to sort numerically.
    pub version: String,
}

impl ServiceDeploymentRef {
    pub fn new<A, S, V>(application: A, service: S, version: V) -> Self
    where
        A: Into<String>,
        S: Into<String>,
        V: Into<String>,
    {
        ServiceDeploymentRef {
            application: application.into(),
            service: service.into(),
            version: version.into(),
        }
    }

    /// `application-service-version` with dots replaced by dashes.
    pub fn deployment_id(&self) -> DeploymentId {
        DeploymentId::normalize(&format!(
            "{}-{}-{}",
            self.application, self.service, self.version
        ))
    }

    /// The path prefix this service is reachable under.
    pub fn prefix(&self) -> String {
        format!("/{}/{}/", self.application, self.service)
    }
}

impl fmt::Display for ServiceDeploymentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.application, self.service, self.version)
    }
}

/// A member of a traffic split.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WeightedTarget {
    pub deployment: ServiceDeploymentRef,
    pub weight: u32,
    /// Application generation the member was resolved from. Injected into the
    /// upstream request so the callee knows which generation it serves.
    pub generation: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Single(ServiceDeploymentRef),
    Weighted(Vec<WeightedTarget>),
}

impl Target {
    /// String used for "latest wins" comparison and as the final sort
    /// tiebreak. Weighted members are joined in list order.
    pub fn deployment_key(&self) -> String {
        match self {
            Target::Single(deployment) => deployment.deployment_id().to_string(),
            Target::Weighted(members) => members
                .iter()
                .map(|m| m.deployment.deployment_id().to_string())
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Every deployment referenced by this target.
    pub fn deployments(&self) -> Vec<&ServiceDeploymentRef> {
        match self {
            Target::Single(deployment) => vec![deployment],
            Target::Weighted(members) => members.iter().map(|m| &m.deployment).collect(),
        }
    }
}

/// One candidate routing rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteIntent {
    pub prefix: String,
    pub header_matchers: Headers,
    pub headers_to_add: Headers,
    pub target: Target,
    pub is_override: bool,
    pub is_custom: bool,
}

impl RouteIntent {
    /// Creates a non-custom intent with no header constraints.
    pub fn new(prefix: impl Into<String>, target: Target) -> Self {
        RouteIntent {
            prefix: prefix.into(),
            header_matchers: Headers::new(),
            headers_to_add: Headers::new(),
            target,
            is_override: false,
            is_custom: false,
        }
    }

    pub fn with_matcher(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.header_matchers.insert(name.into(), value.into());
        self
    }

    pub fn with_header_to_add(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers_to_add.insert(name.into(), value.into());
        self
    }

    pub fn custom(mut self) -> Self {
        self.is_custom = true;
        self
    }

    pub fn overriding(mut self) -> Self {
        self.is_override = true;
        self
    }

    pub fn signature(&self) -> RoutingSignature {
        RoutingSignature {
            prefix: self.prefix.clone(),
            matcher_values: self.header_matchers.values().cloned().collect(),
        }
    }
}

/// Deduplication key: the prefix plus the header matcher values in matcher
/// order. Values are kept as a list so `["app1", "2"]` and `["app12"]` stay
/// distinct.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutingSignature {
    pub prefix: String,
    pub matcher_values: Vec<String>,
}

/// Normalizes a path prefix to the `/segment/.../` form. Returns `None` for
/// an empty input. A prefix made only of slashes becomes `/`.
pub fn normalize_prefix(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Some("/".to_string());
    }

    Some(format!("/{}/", segments.join("/")))
}
