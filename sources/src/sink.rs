use crate::config::SinkConfig;
use crate::errors::SinkError;
use crate::metrics_defs::{SINK_PUBLISH_DURATION, SINK_PUBLISH_FAILURES};
use async_trait::async_trait;
use compiler::change::PublishedArtifact;
use reqwest::header::CONTENT_TYPE;
use shared::{counter, histogram};
use std::time::Instant;
use url::Url;

pub const CONFIG_VERSION_HEADER: &str = "X-Config-Version";
pub const CONFIG_DIGEST_HEADER: &str = "X-Config-Digest";

/// Accepts a complete rendered configuration and swaps it in atomically.
#[async_trait]
pub trait ControlPlaneSink: Send + Sync {
    async fn publish(&self, artifact: &PublishedArtifact) -> Result<(), SinkError>;
}

/// POSTs the serialized configuration to the control plane. A single
/// attempt is made; a failed publish is retried by the next run.
pub struct HttpControlPlaneSink {
    client: reqwest::Client,
    url: Url,
}

impl HttpControlPlaneSink {
    pub fn new(config: &SinkConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(HttpControlPlaneSink {
            client,
            url: config.url.clone(),
        })
    }

    async fn send(&self, artifact: &PublishedArtifact) -> Result<(), SinkError> {
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(CONFIG_VERSION_HEADER, artifact.version.to_string())
            .header(CONFIG_DIGEST_HEADER, artifact.digest.as_str())
            .body(artifact.payload.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ControlPlaneSink for HttpControlPlaneSink {
    async fn publish(&self, artifact: &PublishedArtifact) -> Result<(), SinkError> {
        let started = Instant::now();
        let result = self.send(artifact).await;
        histogram!(SINK_PUBLISH_DURATION).record(started.elapsed().as_secs_f64());

        match &result {
            Ok(()) => tracing::info!(
                version = artifact.version,
                digest = %artifact.digest,
                bytes = artifact.payload.len(),
                "Published configuration"
            ),
            Err(e) => {
                counter!(SINK_PUBLISH_FAILURES).increment(1);
                tracing::error!(version = artifact.version, error = %e, "Publish failed");
            }
        }
        result
    }
}
