use compiler::config::{CompilerConfig, ValidationError as CompilerValidationError};
use serde::Deserialize;
use sources::config::{
    PublishedStoreType, SinkConfig, SourcesConfig, ValidationError as SourcesValidationError,
};
use std::fs::File;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

fn default_metrics_prefix() -> String {
    "cortex".to_string()
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub sentry_dsn: Option<String>,
    /// An `EnvFilter` directive. `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub sources: SourcesConfig,
    /// Required to publish. `compile` works without it.
    pub sink: Option<SinkConfig>,
    /// Where the last published artifact is kept. Without it every publish
    /// run sends the configuration.
    pub state: Option<PublishedStoreType>,
    #[serde(default)]
    pub compiler: CompilerConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(metrics) = &self.common.metrics {
            if metrics.statsd_port == 0 {
                return Err(ConfigError::InvalidStatsdPort);
            }
        }
        self.sources.validate()?;
        if let Some(sink) = &self.sink {
            sink.validate()?;
        }
        if let Some(state) = &self.state {
            state.validate()?;
        }
        self.compiler.validate()?;
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid sources config: {0}")]
    Sources(#[from] SourcesValidationError),
    #[error("invalid compiler config: {0}")]
    Compiler(#[from] CompilerValidationError),
    #[error("statsd port cannot be 0")]
    InvalidStatsdPort,
}
