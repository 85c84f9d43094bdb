//! Proxy Config Renderer
//!
//! Maps a [`CompiledTable`] onto the edge proxy's xDS JSON shapes. Field
//! names follow the proxy's v3 API so the control plane can apply the payload
//! without translation.
//!
//! Every collection in here is a `Vec` or an ordered struct, so the
//! serialized form of the same table is always the same bytes.

use crate::clusters::{
    ClusterDef, CompiledMember, CompiledRoute, CompiledTarget, DiscoveryType, DnsLookupFamily,
    LbPolicy, Upstream,
};
use crate::config::{CompilerConfig, CorsConfig};
use crate::model::{APP_NAME_HEADER, APP_VERSION_HEADER, Headers};
use crate::{CatchAll, CompiledTable};
use serde::Serialize;
use std::time::Duration;

const TLS_TRANSPORT_SOCKET: &str = "envoy.transport_sockets.tls";
const UPSTREAM_TLS_CONTEXT_TYPE: &str =
    "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.UpstreamTlsContext";

/// The complete proxy configuration, replaced atomically on publish.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProxyConfig {
    pub listeners: Vec<Listener>,
    pub route_config: RouteConfiguration,
    pub clusters: Vec<Cluster>,
}

impl ProxyConfig {
    /// Routes of the single virtual host, in match order.
    pub fn routes(&self) -> &[Route] {
        self.route_config
            .virtual_hosts
            .first()
            .map(|host| host.routes.as_slice())
            .unwrap_or_default()
    }

    pub fn ends_with_catch_all(&self) -> bool {
        matches!(
            self.routes().last(),
            Some(Route {
                route_match: RouteMatch { prefix, headers },
                action: Action::DirectResponse(_),
                ..
            }) if prefix == "/" && headers.is_empty()
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Listener {
    pub name: String,
    pub address: Address,
    pub route_config_name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Address {
    pub socket_address: SocketAddress,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SocketAddress {
    pub protocol: &'static str,
    pub address: String,
    pub port_value: u16,
}

impl Address {
    fn tcp(address: impl Into<String>, port: u16) -> Self {
        Address {
            socket_address: SocketAddress {
                protocol: "TCP",
                address: address.into(),
                port_value: port,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteConfiguration {
    pub name: String,
    pub virtual_hosts: Vec<VirtualHost>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VirtualHost {
    pub name: String,
    pub domains: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cors: Option<CorsPolicy>,
    pub routes: Vec<Route>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CorsPolicy {
    pub allow_origin_string_match: Vec<StringMatcher>,
    pub allow_methods: String,
    pub allow_headers: String,
    pub expose_headers: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StringMatcher {
    pub exact: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Route {
    #[serde(rename = "match")]
    pub route_match: RouteMatch,
    #[serde(flatten)]
    pub action: Action,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub request_headers_to_add: Vec<HeaderValueOption>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub response_headers_to_add: Vec<HeaderValueOption>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteMatch {
    pub prefix: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<HeaderMatcher>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HeaderMatcher {
    pub name: String,
    pub string_match: StringMatcher,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Route(RouteAction),
    DirectResponse(DirectResponseAction),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteAction {
    #[serde(flatten)]
    pub cluster_specifier: ClusterSpecifier,
    pub prefix_rewrite: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_rewrite_literal: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterSpecifier {
    Cluster(String),
    WeightedClusters(WeightedClusters),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WeightedClusters {
    pub clusters: Vec<ClusterWeight>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterWeight {
    pub name: String,
    pub weight: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub request_headers_to_add: Vec<HeaderValueOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_rewrite_literal: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DirectResponseAction {
    pub status: u16,
    pub body: DataSource,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DataSource {
    pub inline_string: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HeaderValueOption {
    pub header: HeaderValue,
    pub append_action: AppendAction,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HeaderValue {
    pub key: String,
    pub value: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppendAction {
    AppendIfExistsOrAdd,
    OverwriteIfExistsOrAdd,
}

impl HeaderValueOption {
    fn new(key: impl Into<String>, value: impl Into<String>, append_action: AppendAction) -> Self {
        HeaderValueOption {
            header: HeaderValue {
                key: key.into(),
                value: value.into(),
            },
            append_action,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Cluster {
    pub name: String,
    /// Protobuf JSON duration, e.g. `1s` or `0.250s`
    pub connect_timeout: String,
    #[serde(rename = "type")]
    pub discovery_type: DiscoveryType,
    pub dns_lookup_family: DnsLookupFamily,
    pub lb_policy: LbPolicy,
    pub load_assignment: ClusterLoadAssignment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_socket: Option<TransportSocket>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterLoadAssignment {
    pub cluster_name: String,
    pub endpoints: Vec<LocalityLbEndpoints>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LocalityLbEndpoints {
    pub lb_endpoints: Vec<LbEndpoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LbEndpoint {
    pub endpoint: Endpoint,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Endpoint {
    pub address: Address,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransportSocket {
    pub name: &'static str,
    pub typed_config: UpstreamTlsContext,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UpstreamTlsContext {
    #[serde(rename = "@type")]
    pub type_url: &'static str,
    pub sni: String,
}

pub fn render(table: &CompiledTable, config: &CompilerConfig) -> ProxyConfig {
    let mut routes: Vec<Route> = table.routes.iter().map(render_route).collect();
    routes.push(render_catch_all(&table.catch_all));

    let virtual_host = VirtualHost {
        name: config.virtual_host.name.clone(),
        domains: config.virtual_host.domains.clone(),
        cors: config.virtual_host.cors.as_ref().map(render_cors),
        routes,
    };

    ProxyConfig {
        listeners: vec![Listener {
            name: config.listener.name.clone(),
            address: Address::tcp(&config.listener.address, config.listener.port),
            route_config_name: config.route_config_name.clone(),
        }],
        route_config: RouteConfiguration {
            name: config.route_config_name.clone(),
            virtual_hosts: vec![virtual_host],
        },
        clusters: table.clusters.iter().map(render_cluster).collect(),
    }
}

fn render_cors(cors: &CorsConfig) -> CorsPolicy {
    CorsPolicy {
        allow_origin_string_match: cors
            .allow_origins
            .iter()
            .map(|origin| StringMatcher {
                exact: origin.clone(),
            })
            .collect(),
        allow_methods: cors.allow_methods.clone(),
        allow_headers: cors.allow_headers.clone(),
        expose_headers: cors.expose_headers.clone(),
    }
}

fn render_route(route: &CompiledRoute) -> Route {
    let action = match &route.target {
        CompiledTarget::Cluster { cluster, upstream } => RouteAction {
            cluster_specifier: ClusterSpecifier::Cluster(cluster.to_string()),
            prefix_rewrite: path_rewrite(upstream).to_string(),
            host_rewrite_literal: host_rewrite(upstream),
        },
        CompiledTarget::Weighted(members) => RouteAction {
            cluster_specifier: ClusterSpecifier::WeightedClusters(WeightedClusters {
                clusters: members.iter().map(render_member).collect(),
            }),
            prefix_rewrite: weighted_path_rewrite(&route.prefix, members).to_string(),
            host_rewrite_literal: None,
        },
    };

    Route {
        route_match: RouteMatch {
            prefix: route.prefix.clone(),
            headers: render_matchers(&route.header_matchers),
        },
        action: Action::Route(action),
        request_headers_to_add: route
            .headers_to_add
            .iter()
            .map(|(name, value)| {
                HeaderValueOption::new(name, value, AppendAction::AppendIfExistsOrAdd)
            })
            .collect(),
        // Browsers keep the generation they were served through a cookie
        response_headers_to_add: route
            .headers_to_add
            .iter()
            .map(|(name, value)| {
                HeaderValueOption::new(
                    "Set-Cookie",
                    format!("{name}={value}; Path=/; SameSite=Lax"),
                    AppendAction::AppendIfExistsOrAdd,
                )
            })
            .collect(),
    }
}

fn path_rewrite(upstream: &Upstream) -> &str {
    match upstream {
        Upstream::Standard => "/",
        Upstream::Serverless { path_rewrite, .. } => path_rewrite,
    }
}

fn host_rewrite(upstream: &Upstream) -> Option<String> {
    match upstream {
        Upstream::Standard => None,
        Upstream::Serverless { hostname, .. } => Some(hostname.clone()),
    }
}

/// Envoy rewrites the path per route, not per weighted cluster. The members'
/// rewrite is applied when they all agree; otherwise every member gets `/`.
/// Hosts are rewritten per member.
fn weighted_path_rewrite<'a>(prefix: &str, members: &'a [CompiledMember]) -> &'a str {
    let mut rewrites = members.iter().map(|member| path_rewrite(&member.upstream));
    let Some(first) = rewrites.next() else {
        return "/";
    };
    if rewrites.all(|rewrite| rewrite == first) {
        first
    } else {
        tracing::warn!(
            prefix,
            "Weighted members need different path rewrites, rewriting to /"
        );
        "/"
    }
}

fn render_member(member: &CompiledMember) -> ClusterWeight {
    ClusterWeight {
        name: member.cluster.to_string(),
        weight: member.weight,
        request_headers_to_add: vec![
            HeaderValueOption::new(
                APP_VERSION_HEADER,
                member.generation.to_string(),
                AppendAction::OverwriteIfExistsOrAdd,
            ),
            HeaderValueOption::new(
                APP_NAME_HEADER,
                &member.application,
                AppendAction::OverwriteIfExistsOrAdd,
            ),
        ],
        host_rewrite_literal: host_rewrite(&member.upstream),
    }
}

fn render_matchers(matchers: &Headers) -> Vec<HeaderMatcher> {
    matchers
        .iter()
        .map(|(name, value)| HeaderMatcher {
            name: name.clone(),
            string_match: StringMatcher {
                exact: value.clone(),
            },
        })
        .collect()
}

fn render_catch_all(catch_all: &CatchAll) -> Route {
    Route {
        route_match: RouteMatch {
            prefix: "/".to_string(),
            headers: vec![],
        },
        action: Action::DirectResponse(DirectResponseAction {
            status: catch_all.status,
            body: DataSource {
                inline_string: catch_all.body.clone(),
            },
        }),
        request_headers_to_add: vec![],
        response_headers_to_add: vec![],
    }
}

fn render_cluster(cluster: &ClusterDef) -> Cluster {
    Cluster {
        name: cluster.id.to_string(),
        connect_timeout: format_duration(cluster.connect_timeout),
        discovery_type: cluster.discovery,
        dns_lookup_family: cluster.dns_lookup_family,
        lb_policy: cluster.lb_policy,
        load_assignment: ClusterLoadAssignment {
            cluster_name: cluster.id.to_string(),
            endpoints: vec![LocalityLbEndpoints {
                lb_endpoints: vec![LbEndpoint {
                    endpoint: Endpoint {
                        address: Address::tcp(&cluster.address, cluster.port),
                    },
                }],
            }],
        },
        transport_socket: cluster.tls_sni.as_ref().map(|sni| TransportSocket {
            name: TLS_TRANSPORT_SOCKET,
            typed_config: UpstreamTlsContext {
                type_url: UPSTREAM_TLS_CONTEXT_TYPE,
                sni: sni.clone(),
            },
        }),
    }
}

/// Formats a duration the way protobuf JSON does: whole seconds, or 3, 6 or 9
/// fractional digits.
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let nanos = duration.subsec_nanos();
    if nanos == 0 {
        format!("{secs}s")
    } else if nanos % 1_000_000 == 0 {
        format!("{secs}.{:03}s", nanos / 1_000_000)
    } else if nanos % 1_000 == 0 {
        format!("{secs}.{:06}s", nanos / 1_000)
    } else {
        format!("{secs}.{nanos:09}s")
    }
}
