use crate::dedup::TieBreak;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0: {0}")]
    InvalidPort(&'static str),

    #[error("Connect timeout cannot be 0")]
    ZeroConnectTimeout,

    #[error("Route config name cannot be empty")]
    EmptyRouteConfigName,

    #[error("Virtual host name cannot be empty")]
    EmptyVirtualHostName,

    #[error("Virtual host must have at least one domain")]
    NoDomains,
}

/// Knobs for the compiler and the rendered proxy configuration. Every field
/// has a default matching the production edge proxy.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompilerConfig {
    /// How competing routes for the same signature are ranked
    pub tie_break: TieBreak,
    pub route_config_name: String,
    pub listener: ListenerConfig,
    pub virtual_host: VirtualHostConfig,
    pub clusters: ClusterTemplate,
    pub catch_all: CatchAllConfig,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            tie_break: TieBreak::default(),
            route_config_name: "backend".to_string(),
            listener: ListenerConfig::default(),
            virtual_host: VirtualHostConfig::default(),
            clusters: ClusterTemplate::default(),
            catch_all: CatchAllConfig::default(),
        }
    }
}

impl CompilerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.route_config_name.trim().is_empty() {
            return Err(ValidationError::EmptyRouteConfigName);
        }
        self.listener.validate()?;
        self.virtual_host.validate()?;
        self.clusters.validate()?;
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    pub name: String,
    pub address: String,
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        ListenerConfig {
            name: "local_listener".to_string(),
            address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ListenerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort("listener.port"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct VirtualHostConfig {
    pub name: String,
    pub domains: Vec<String>,
    /// Omitted from the rendered host when `None`
    pub cors: Option<CorsConfig>,
}

impl Default for VirtualHostConfig {
    fn default() -> Self {
        VirtualHostConfig {
            name: "backend".to_string(),
            domains: vec!["*".to_string()],
            cors: Some(CorsConfig::default()),
        }
    }
}

impl VirtualHostConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyVirtualHostName);
        }
        if self.domains.is_empty() {
            return Err(ValidationError::NoDomains);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorsConfig {
    /// Exact-match allowed origins
    pub allow_origins: Vec<String>,
    pub allow_methods: String,
    pub allow_headers: String,
    pub expose_headers: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        CorsConfig {
            allow_origins: vec!["*".to_string()],
            allow_methods: "GET, POST, OPTIONS".to_string(),
            allow_headers: "X-Stack-Version, Content-Type".to_string(),
            expose_headers: "X-Stack-Version".to_string(),
        }
    }
}

/// Template every emitted upstream cluster is built from.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterTemplate {
    /// Port of standard deployments
    pub port: u16,
    /// Port of serverless deployments, always reached over TLS
    pub tls_port: u16,
    pub connect_timeout_ms: u64,
}

impl Default for ClusterTemplate {
    fn default() -> Self {
        ClusterTemplate {
            port: 80,
            tls_port: 443,
            connect_timeout_ms: 1000,
        }
    }
}

impl ClusterTemplate {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort("clusters.port"));
        }
        if self.tls_port == 0 {
            return Err(ValidationError::InvalidPort("clusters.tls_port"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ValidationError::ZeroConnectTimeout);
        }
        Ok(())
    }
}

/// Status of the terminal direct response. Only its body is configurable.
pub const CATCH_ALL_STATUS: u16 = 404;

/// The terminal direct response for requests no route matched.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatchAllConfig {
    pub body: String,
}

impl Default for CatchAllConfig {
    fn default() -> Self {
        CatchAllConfig {
            body: "Invalid API Route".to_string(),
        }
    }
}
