//! Cluster Resolver
//!
//! Attaches platform metadata to every sorted route and derives the upstream
//! cluster each referenced deployment needs.
//!
//! | platform     | discovery   | dns     | port     | tls             |
//! |--------------|-------------|---------|----------|-----------------|
//! | standard     | STRICT_DNS  | AUTO    | 80       | no              |
//! | serverless   | LOGICAL_DNS | V4_ONLY | 443      | SNI = hostname  |
//!
//! Standard clusters resolve the deployment identifier itself as a DNS name.
//! Deployments the registry does not know are treated as standard.

use crate::config::ClusterTemplate;
use crate::model::{DeploymentId, Headers, RouteIntent, Target};
use crate::registry::{Platform, PlatformInfo, PlatformRegistry};
use crate::report::CompileReport;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscoveryType {
    StrictDns,
    LogicalDns,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DnsLookupFamily {
    Auto,
    V4Only,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LbPolicy {
    RoundRobin,
}

/// One upstream cluster, keyed by deployment identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterDef {
    pub id: DeploymentId,
    pub address: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub lb_policy: LbPolicy,
    pub discovery: DiscoveryType,
    pub dns_lookup_family: DnsLookupFamily,
    pub tls_sni: Option<String>,
}

/// How requests reach a deployment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Upstream {
    Standard,
    Serverless {
        hostname: String,
        path_rewrite: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledMember {
    pub cluster: DeploymentId,
    pub weight: u32,
    pub application: String,
    pub generation: u64,
    pub upstream: Upstream,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompiledTarget {
    Cluster {
        cluster: DeploymentId,
        upstream: Upstream,
    },
    Weighted(Vec<CompiledMember>),
}

/// A winning intent with its target resolved to clusters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledRoute {
    pub prefix: String,
    pub header_matchers: Headers,
    pub headers_to_add: Headers,
    pub target: CompiledTarget,
    pub is_override: bool,
}

impl CompiledRoute {
    pub fn clusters(&self) -> Vec<&DeploymentId> {
        match &self.target {
            CompiledTarget::Cluster { cluster, .. } => vec![cluster],
            CompiledTarget::Weighted(members) => members.iter().map(|m| &m.cluster).collect(),
        }
    }
}

/// Resolves the sorted intents in order. Every deployment is looked up in the
/// registry once, however many routes reference it.
///
/// Returns the compiled routes and the distinct clusters sorted by identifier.
pub fn resolve<R>(
    intents: Vec<RouteIntent>,
    registry: &R,
    template: &ClusterTemplate,
    report: &mut CompileReport,
) -> (Vec<CompiledRoute>, Vec<ClusterDef>)
where
    R: PlatformRegistry + ?Sized,
{
    let mut resolver = Resolver {
        registry,
        template,
        report,
        resolved: BTreeMap::new(),
    };

    let routes = intents
        .into_iter()
        .map(|intent| resolver.compile_route(intent))
        .collect();

    let clusters = resolver
        .resolved
        .into_values()
        .map(|(cluster, _)| cluster)
        .collect();

    (routes, clusters)
}

struct Resolver<'a, R: ?Sized> {
    registry: &'a R,
    template: &'a ClusterTemplate,
    report: &'a mut CompileReport,
    resolved: BTreeMap<DeploymentId, (ClusterDef, Upstream)>,
}

impl<R: PlatformRegistry + ?Sized> Resolver<'_, R> {
    fn compile_route(&mut self, intent: RouteIntent) -> CompiledRoute {
        let target = match intent.target {
            Target::Single(deployment) => {
                let cluster = deployment.deployment_id();
                let upstream = self.upstream(&cluster);
                CompiledTarget::Cluster { cluster, upstream }
            }
            Target::Weighted(members) => CompiledTarget::Weighted(
                members
                    .into_iter()
                    .map(|member| {
                        let cluster = member.deployment.deployment_id();
                        let upstream = self.upstream(&cluster);
                        CompiledMember {
                            cluster,
                            weight: member.weight,
                            application: member.deployment.application,
                            generation: member.generation,
                            upstream,
                        }
                    })
                    .collect(),
            ),
        };

        CompiledRoute {
            prefix: intent.prefix,
            header_matchers: intent.header_matchers,
            headers_to_add: intent.headers_to_add,
            target,
            is_override: intent.is_override,
        }
    }

    fn upstream(&mut self, id: &DeploymentId) -> Upstream {
        if let Some((_, upstream)) = self.resolved.get(id) {
            return upstream.clone();
        }

        let registry = self.registry;
        let resolved = match registry.lookup(id) {
            Some(info) => self.from_registry(id, info),
            None => {
                tracing::debug!(cluster = %id, "Deployment not in registry, using standard template");
                self.report.registry_misses += 1;
                (self.standard(id), Upstream::Standard)
            }
        };

        let upstream = resolved.1.clone();
        self.resolved.insert(id.clone(), resolved);
        upstream
    }

    fn from_registry(&mut self, id: &DeploymentId, info: &PlatformInfo) -> (ClusterDef, Upstream) {
        match info.platform {
            Platform::Standard => (self.standard(id), Upstream::Standard),
            Platform::Serverless => {
                let hostname = info
                    .hostname
                    .as_deref()
                    .map(str::trim)
                    .filter(|h| !h.is_empty());

                let Some(hostname) = hostname else {
                    tracing::warn!(cluster = %id, "Serverless deployment has no hostname, using standard template");
                    self.report.invalid_registry_entries += 1;
                    return (self.standard(id), Upstream::Standard);
                };

                let path_rewrite = info
                    .path_rewrite
                    .clone()
                    .filter(|p| !p.is_empty())
                    .unwrap_or_else(|| "/".to_string());

                (
                    self.serverless(id, hostname),
                    Upstream::Serverless {
                        hostname: hostname.to_string(),
                        path_rewrite,
                    },
                )
            }
        }
    }

    fn standard(&self, id: &DeploymentId) -> ClusterDef {
        ClusterDef {
            id: id.clone(),
            address: id.to_string(),
            port: self.template.port,
            connect_timeout: self.template.connect_timeout(),
            lb_policy: LbPolicy::RoundRobin,
            discovery: DiscoveryType::StrictDns,
            dns_lookup_family: DnsLookupFamily::Auto,
            tls_sni: None,
        }
    }

    fn serverless(&self, id: &DeploymentId, hostname: &str) -> ClusterDef {
        ClusterDef {
            id: id.clone(),
            address: hostname.to_string(),
            port: self.template.tls_port,
            connect_timeout: self.template.connect_timeout(),
            lb_policy: LbPolicy::RoundRobin,
            discovery: DiscoveryType::LogicalDns,
            dns_lookup_family: DnsLookupFamily::V4Only,
            tls_sni: Some(hostname.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ServiceDeploymentRef, WeightedTarget};
    use crate::registry::RegistrySnapshot;
    use crate::testutils::{intent, serverless_registry, single};
    use std::cell::Cell;

    /// Registry wrapper counting lookups.
    struct CountingRegistry {
        inner: RegistrySnapshot,
        lookups: Cell<usize>,
    }

    impl PlatformRegistry for CountingRegistry {
        fn lookup(&self, id: &DeploymentId) -> Option<&PlatformInfo> {
            self.lookups.set(self.lookups.get() + 1);
            self.inner.lookup(id)
        }
    }

    fn split(members: &[(&str, &str, u32, u64)]) -> Target {
        Target::Weighted(
            members
                .iter()
                .map(|(service, version, weight, generation)| WeightedTarget {
                    deployment: ServiceDeploymentRef::new("app1", *service, *version),
                    weight: *weight,
                    generation: *generation,
                })
                .collect(),
        )
    }

    #[test]
    fn test_standard_cluster_for_registry_miss() {
        let mut report = CompileReport::default();
        let (routes, clusters) = resolve(
            vec![intent("/app1/svc/", single("app1", "svc", "0.0.1"))],
            &RegistrySnapshot::default(),
            &ClusterTemplate::default(),
            &mut report,
        );

        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert_eq!(cluster.id.as_str(), "app1-svc-0-0-1");
        assert_eq!(cluster.address, "app1-svc-0-0-1");
        assert_eq!(cluster.port, 80);
        assert_eq!(cluster.discovery, DiscoveryType::StrictDns);
        assert_eq!(cluster.lb_policy, LbPolicy::RoundRobin);
        assert_eq!(cluster.connect_timeout, Duration::from_secs(1));
        assert!(cluster.tls_sni.is_none());

        assert_eq!(
            routes[0].target,
            CompiledTarget::Cluster {
                cluster: DeploymentId::normalize("app1-svc-0-0-1"),
                upstream: Upstream::Standard,
            }
        );
        assert_eq!(report.registry_misses, 1);
    }

    #[test]
    fn test_serverless_cluster() {
        let registry = serverless_registry(&[("app1/fn@1.0.0", "fn.lambda-url.aws")]);
        let mut report = CompileReport::default();
        let (routes, clusters) = resolve(
            vec![intent("/app1/fn/", single("app1", "fn", "1.0.0"))],
            &registry,
            &ClusterTemplate::default(),
            &mut report,
        );

        let cluster = &clusters[0];
        assert_eq!(cluster.address, "fn.lambda-url.aws");
        assert_eq!(cluster.port, 443);
        assert_eq!(cluster.discovery, DiscoveryType::LogicalDns);
        assert_eq!(cluster.dns_lookup_family, DnsLookupFamily::V4Only);
        assert_eq!(cluster.tls_sni.as_deref(), Some("fn.lambda-url.aws"));

        let CompiledTarget::Cluster { upstream, .. } = &routes[0].target else {
            panic!("expected a single cluster target");
        };
        assert_eq!(
            upstream,
            &Upstream::Serverless {
                hostname: "fn.lambda-url.aws".to_string(),
                path_rewrite: "/".to_string(),
            }
        );
        assert_eq!(report.registry_misses, 0);
    }

    #[test]
    fn test_serverless_without_hostname_falls_back() {
        let mut registry = RegistrySnapshot::default();
        registry.insert_named(
            "app1/fn@1.0.0",
            PlatformInfo {
                platform: Platform::Serverless,
                hostname: None,
                path_rewrite: Some("/prod/".to_string()),
            },
        );
        let mut report = CompileReport::default();
        let (_, clusters) = resolve(
            vec![intent("/app1/fn/", single("app1", "fn", "1.0.0"))],
            &registry,
            &ClusterTemplate::default(),
            &mut report,
        );

        assert_eq!(clusters[0].discovery, DiscoveryType::StrictDns);
        assert_eq!(report.invalid_registry_entries, 1);
    }

    #[test]
    fn test_clusters_deduplicated_and_sorted() {
        let registry = CountingRegistry {
            inner: RegistrySnapshot::default(),
            lookups: Cell::new(0),
        };
        let intents = vec![
            intent("/app1/web/", single("app1", "web", "2.0.0")),
            intent("/app1/svc/", split(&[("svc", "0.0.2", 30, 2), ("svc", "0.0.1", 70, 1)])),
            intent("/app1/svc/", single("app1", "svc", "0.0.1")).with_matcher("X-App-Version", "1"),
            intent("/app1/web/", single("app1", "web", "2.0.0")).with_matcher("X-App-Version", "1"),
        ];

        let mut report = CompileReport::default();
        let (routes, clusters) = resolve(intents, &registry, &ClusterTemplate::default(), &mut report);

        let ids: Vec<&str> = clusters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["app1-svc-0-0-1", "app1-svc-0-0-2", "app1-web-2-0-0"]);
        assert_eq!(registry.lookups.get(), 3);
        assert_eq!(report.registry_misses, 3);

        // Route order is untouched and weights are carried over
        assert_eq!(routes[0].prefix, "/app1/web/");
        let CompiledTarget::Weighted(members) = &routes[1].target else {
            panic!("expected a weighted target");
        };
        let weights: Vec<(&str, u32, u64)> = members
            .iter()
            .map(|m| (m.cluster.as_str(), m.weight, m.generation))
            .collect();
        assert_eq!(
            weights,
            vec![("app1-svc-0-0-2", 30, 2), ("app1-svc-0-0-1", 70, 1)]
        );
        assert_eq!(routes[1].clusters().len(), 2);
    }

    #[test]
    fn test_template_applies_to_every_cluster() {
        let template = ClusterTemplate {
            port: 8000,
            tls_port: 8443,
            connect_timeout_ms: 250,
        };
        let registry = serverless_registry(&[("app1/fn@1.0.0", "fn.example.com")]);
        let mut report = CompileReport::default();
        let (_, clusters) = resolve(
            vec![
                intent("/app1/fn/", single("app1", "fn", "1.0.0")),
                intent("/app1/svc/", single("app1", "svc", "1.0.0")),
            ],
            &registry,
            &template,
            &mut report,
        );

        assert_eq!(clusters[0].port, 8443);
        assert_eq!(clusters[1].port, 8000);
        assert!(clusters.iter().all(|c| c.connect_timeout == Duration::from_millis(250)));
    }
}
