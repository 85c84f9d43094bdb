//! Change Detector
//!
//! Decides whether a freshly rendered configuration needs publishing. The
//! rendered config is serialized to JSON and compared byte-for-byte with the
//! last published artifact. Identical bytes mean nothing to do.

use crate::errors::Result;
use crate::render::ProxyConfig;
use sha2::{Digest, Sha256};

/// A serialized configuration with its sequence number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedArtifact {
    pub version: u64,
    /// Hex SHA-256 of `payload`
    pub digest: String,
    pub payload: Vec<u8>,
}

impl PublishedArtifact {
    pub fn new(version: u64, payload: Vec<u8>) -> Self {
        PublishedArtifact {
            version,
            digest: digest(&payload),
            payload,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublishDecision {
    /// The previous artifact already carries this configuration.
    Unchanged { version: u64 },
    Publish(PublishedArtifact),
}

/// Deterministic JSON encoding of the rendered configuration.
pub fn encode(config: &ProxyConfig) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(config)?)
}

pub fn digest(payload: &[u8]) -> String {
    format!("{:x}", Sha256::digest(payload))
}

pub fn detect_change(
    config: &ProxyConfig,
    previous: Option<&PublishedArtifact>,
) -> Result<PublishDecision> {
    let payload = encode(config)?;

    match previous {
        Some(previous) if previous.payload == payload => {
            tracing::debug!(version = previous.version, "Configuration unchanged");
            Ok(PublishDecision::Unchanged {
                version: previous.version,
            })
        }
        previous => {
            let version = previous.map_or(1, |p| p.version + 1);
            Ok(PublishDecision::Publish(PublishedArtifact::new(
                version, payload,
            )))
        }
    }
}
