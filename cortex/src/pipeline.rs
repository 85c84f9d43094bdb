//! One run of the compiler: load every source, compile, and either write the
//! result out or hand it to the control plane.

use compiler::change::{PublishDecision, PublishedArtifact, detect_change, encode};
use compiler::config::CompilerConfig;
use compiler::errors::CompileError;
use compiler::{Compilation, compile};
use sources::errors::{SinkError, SourceError, StoreError};
use sources::published::PublishedStore;
use sources::sink::ControlPlaneSink;
use sources::{LoadedSnapshot, Sources};

#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("could not load sources: {0}")]
    Source(#[from] SourceError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("could not publish configuration: {0}")]
    Sink(#[from] SinkError),
    #[error("published artifact store failed: {0}")]
    Store(#[from] StoreError),
    #[error("no sink configured")]
    NoSink,
    #[error("could not write output: {0}")]
    Output(#[from] std::io::Error),
}

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Unchanged { version: u64 },
    Published { version: u64, digest: String },
    /// The artifact that would have been published.
    DryRun { version: u64, digest: String },
}

pub async fn load_and_compile(
    sources: &Sources,
    config: &CompilerConfig,
) -> Result<Compilation, RunError> {
    let LoadedSnapshot {
        snapshot,
        undecodable_records,
        unreadable_applications,
    } = sources.load().await?;

    let mut compilation = compile(&snapshot, config);
    // What the adapters could not read never reached the collector
    compilation.report.malformed_records += undecodable_records;
    compilation
        .report
        .missing_applications
        .extend(unreadable_applications);
    Ok(compilation)
}

/// Serialized rendered configuration, as it would be published.
pub fn render_output(compilation: &Compilation) -> Result<Vec<u8>, RunError> {
    Ok(encode(&compilation.proxy_config)?)
}

/// Publishes the compiled configuration when it differs from the last
/// published artifact. The store is only updated after the sink accepted
/// the configuration.
pub async fn publish(
    compilation: &Compilation,
    store: &dyn PublishedStore,
    sink: Option<&dyn ControlPlaneSink>,
    dry_run: bool,
) -> Result<Outcome, RunError> {
    let previous = store.load_latest()?;

    let artifact: PublishedArtifact =
        match detect_change(&compilation.proxy_config, previous.as_ref())? {
            PublishDecision::Unchanged { version } => {
                tracing::info!(version, "Configuration unchanged, nothing to publish");
                return Ok(Outcome::Unchanged { version });
            }
            PublishDecision::Publish(artifact) => artifact,
        };

    if dry_run {
        tracing::info!(
            version = artifact.version,
            digest = %artifact.digest,
            "Dry run, not publishing"
        );
        return Ok(Outcome::DryRun {
            version: artifact.version,
            digest: artifact.digest,
        });
    }

    let sink = sink.ok_or(RunError::NoSink)?;
    sink.publish(&artifact).await?;
    store.store(&artifact)?;

    Ok(Outcome::Published {
        version: artifact.version,
        digest: artifact.digest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sources::config::{ManifestSourceType, PinnedRouteSourceType, SourcesConfig};
    use sources::published::FilesystemPublishedStore;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        published: Mutex<Vec<u64>>,
        fail: bool,
    }

    #[async_trait]
    impl ControlPlaneSink for RecordingSink {
        async fn publish(&self, artifact: &PublishedArtifact) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Rejected {
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            self.published.lock().unwrap().push(artifact.version);
            Ok(())
        }
    }

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn sources_for(root: &Path) -> Sources {
        Sources::from_config(&SourcesConfig {
            manifests: ManifestSourceType::Filesystem {
                root: root.join("manifests"),
            },
            overrides: None,
            pins: Some(PinnedRouteSourceType::Filesystem {
                path: root.join("pins.yaml"),
            }),
            registry: None,
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_compile_counts_undecodable_records() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "manifests/app1/1.yaml", "- {service: svc, version: 0.0.1}");
        write(dir.path(), "pins.yaml", "/broken/: not-a-map");

        let compilation = load_and_compile(&sources_for(dir.path()), &CompilerConfig::default())
            .await
            .unwrap();
        assert_eq!(compilation.table.routes.len(), 2);
        assert_eq!(compilation.report.malformed_records, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_application_is_reported_missing() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "manifests/app1/1.yaml", "- {service: svc, version: 0.0.1}");
        write(dir.path(), "pins.yaml", "");
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("manifests/app2"))
            .unwrap();

        let compilation = load_and_compile(&sources_for(dir.path()), &CompilerConfig::default())
            .await
            .unwrap();
        assert_eq!(compilation.table.routes.len(), 2);
        assert_eq!(compilation.report.missing_applications, vec!["app2"]);
        assert!(!compilation.report.is_complete());
    }

    #[tokio::test]
    async fn test_publish_then_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "manifests/app1/1.yaml", "- {service: svc, version: 0.0.1}");
        write(dir.path(), "pins.yaml", "");
        let sources = sources_for(dir.path());
        let store = FilesystemPublishedStore::new(dir.path().join("state"));
        let sink = RecordingSink::default();

        let compilation = load_and_compile(&sources, &CompilerConfig::default())
            .await
            .unwrap();
        let first = publish(&compilation, &store, Some(&sink), false)
            .await
            .unwrap();
        assert!(matches!(first, Outcome::Published { version: 1, .. }));

        let compilation = load_and_compile(&sources, &CompilerConfig::default())
            .await
            .unwrap();
        let second = publish(&compilation, &store, Some(&sink), false)
            .await
            .unwrap();
        assert_eq!(second, Outcome::Unchanged { version: 1 });

        // A new generation changes the table
        write(dir.path(), "manifests/app1/2.yaml", "- {service: svc, version: 0.0.2}");
        let compilation = load_and_compile(&sources, &CompilerConfig::default())
            .await
            .unwrap();
        let third = publish(&compilation, &store, Some(&sink), false)
            .await
            .unwrap();
        assert!(matches!(third, Outcome::Published { version: 2, .. }));
        assert_eq!(*sink.published.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_failed_publish_does_not_update_store() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "manifests/app1/1.yaml", "- {service: svc, version: 0.0.1}");
        write(dir.path(), "pins.yaml", "");
        let store = FilesystemPublishedStore::new(dir.path().join("state"));
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };

        let compilation = load_and_compile(&sources_for(dir.path()), &CompilerConfig::default())
            .await
            .unwrap();
        let result = publish(&compilation, &store, Some(&sink), false).await;

        assert!(matches!(result, Err(RunError::Sink(_))));
        assert_eq!(store.load_latest().unwrap(), None);
    }

    #[tokio::test]
    async fn test_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "manifests/app1/1.yaml", "- {service: svc, version: 0.0.1}");
        write(dir.path(), "pins.yaml", "");
        let store = FilesystemPublishedStore::new(dir.path().join("state"));

        let compilation = load_and_compile(&sources_for(dir.path()), &CompilerConfig::default())
            .await
            .unwrap();
        let outcome = publish(&compilation, &store, None, true).await.unwrap();

        assert!(matches!(outcome, Outcome::DryRun { version: 1, .. }));
        assert_eq!(store.load_latest().unwrap(), None);

        let missing_sink = publish(&compilation, &store, None, false).await;
        assert!(matches!(missing_sink, Err(RunError::NoSink)));
    }
}
