//! Intent Collector
//!
//! Turns the raw routing sources into a flat list of [`RouteIntent`]s.
//!
//! # Sources
//!
//! 1. **Generation manifests**: for every application, the ordered list of
//!    generations and the services (plus their dependencies) each one resolved.
//! 2. **Override records**: manually curated weighted traffic splits.
//! 3. **Pinned routes**: a prefix pinned to one service of one generation.
//!
//! # Emitted intents
//!
//! For service `svc` at version `V` in generation `G` of application `A`:
//!
//! ```text
//! /A/svc/  {X-App-Version: G}  ─► A/svc@V
//! /A/svc/  {}                  ─► A/svc@V
//! ```
//!
//! and for every dependency `D` of that service:
//!
//! ```text
//! /D.app/D.svc/  {X-App-Name: A, X-App-Version: G}  ─► D
//! /D.app/D.svc/  {X-App-Name: A}                    ─► D
//! ```
//!
//! Every generation emits its own version-less fallback. Deduplication keeps
//! the one with the greatest version, so default traffic follows the newest
//! generation.
//!
//! Override records become one custom weighted intent per prefix. Pinned
//! routes become one custom single-target intent that injects the pinned
//! application name and generation.
//!
//! # Degradation
//!
//! Nothing in here fails the run. Malformed records are skipped, an
//! application with a missing generation manifest contributes nothing, and
//! references that do not resolve are dropped. Everything is counted in the
//! [`CompileReport`].

use crate::model::{
    APP_NAME_HEADER, APP_VERSION_HEADER, RouteIntent, ServiceDeploymentRef, Target,
    WeightedTarget, normalize_prefix,
};
use crate::report::CompileReport;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One service entry of a generation manifest.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    #[serde(default, alias = "svc", deserialize_with = "lenient::opt_string")]
    pub service: Option<String>,
    #[serde(
        default,
        alias = "ver",
        alias = "svc_ver",
        deserialize_with = "lenient::opt_string"
    )]
    pub version: Option<String>,
    #[serde(default, alias = "depends_on")]
    pub dependencies: Vec<DependencyRecord>,
}

/// A dependency of a service. Without an application it refers to a service
/// of the same application.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyRecord {
    #[serde(default, alias = "app", deserialize_with = "lenient::opt_string")]
    pub application: Option<String>,
    #[serde(default, alias = "svc", deserialize_with = "lenient::opt_string")]
    pub service: Option<String>,
    #[serde(default, alias = "ver", deserialize_with = "lenient::opt_string")]
    pub version: Option<String>,
}

/// One generation of an application. `manifest` is `None` when the generation
/// is known to exist but its manifest could not be loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct Generation {
    pub number: u64,
    pub manifest: Option<Vec<ServiceRecord>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ApplicationManifests {
    pub application: String,
    pub generations: Vec<Generation>,
}

/// A manually curated traffic split for one prefix.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideRecord {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub team_id: Option<String>,
    #[serde(default, alias = "targets")]
    pub weighted_targets: Vec<TargetRecord>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetRecord {
    #[serde(default, alias = "app")]
    pub application: Option<String>,
    #[serde(default, alias = "svc")]
    pub service: Option<String>,
    #[serde(default, alias = "app_ver", deserialize_with = "lenient::opt_u64")]
    pub generation: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub weight: Option<u32>,
}

/// A prefix pinned to one service of one application generation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PinnedRouteRecord {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default, alias = "app")]
    pub application: Option<String>,
    #[serde(default, alias = "svc")]
    pub service: Option<String>,
    #[serde(default, alias = "app_ver", deserialize_with = "lenient::opt_u64")]
    pub generation: Option<u64>,
}

/// `(application, generation, service) → version`, built from the manifests.
#[derive(Clone, Debug, Default)]
pub struct VersionLookup {
    versions: HashMap<(String, u64, String), String>,
}

impl VersionLookup {
    /// Indexes every well-formed record of every loaded manifest. Applications
    /// with a missing generation still contribute the generations that loaded.
    pub fn from_manifests(applications: &[ApplicationManifests]) -> Self {
        let mut lookup = VersionLookup::default();
        for app in applications {
            for generation in &app.generations {
                for record in generation.manifest.iter().flatten() {
                    if let (Some(service), Some(version)) =
                        (non_empty(&record.service), non_empty(&record.version))
                    {
                        lookup.insert(&app.application, generation.number, service, version);
                    }
                }
            }
        }
        lookup
    }

    pub fn insert(&mut self, application: &str, generation: u64, service: &str, version: &str) {
        self.versions.insert(
            (application.to_string(), generation, service.to_string()),
            version.to_string(),
        );
    }

    pub fn resolve(&self, application: &str, generation: u64, service: &str) -> Option<&str> {
        self.versions
            .get(&(application.to_string(), generation, service.to_string()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Output of the collector: the raw intents plus what was lost on the way.
#[derive(Debug, Default)]
pub struct Collection {
    pub intents: Vec<RouteIntent>,
    pub report: CompileReport,
}

pub fn collect(
    applications: &[ApplicationManifests],
    overrides: &[OverrideRecord],
    pins: &[PinnedRouteRecord],
    lookup: &VersionLookup,
) -> Collection {
    let mut collector = Collector::default();

    let mut applications: Vec<&ApplicationManifests> = applications.iter().collect();
    applications.sort_by(|a, b| a.application.cmp(&b.application));
    for app in applications {
        collector.add_application(app);
    }

    collector.add_overrides(overrides, lookup);

    for pin in pins {
        collector.add_pin(pin, lookup);
    }

    collector.report.intents_collected = collector.intents.len();
    Collection {
        intents: collector.intents,
        report: collector.report,
    }
}

#[derive(Default)]
struct Collector {
    intents: Vec<RouteIntent>,
    report: CompileReport,
}

impl Collector {
    fn add_application(&mut self, app: &ApplicationManifests) {
        if let Some(missing) = app.generations.iter().find(|g| g.manifest.is_none()) {
            tracing::warn!(
                application = %app.application,
                generation = missing.number,
                "Generation manifest missing, skipping application"
            );
            self.report.missing_applications.push(app.application.clone());
            return;
        }

        let mut generations: Vec<&Generation> = app.generations.iter().collect();
        generations.sort_by_key(|g| g.number);

        for pair in generations.windows(2) {
            let gap = pair[1].number.saturating_sub(pair[0].number.saturating_add(1));
            if gap > 0 {
                tracing::warn!(
                    application = %app.application,
                    after = pair[0].number,
                    before = pair[1].number,
                    "Gap in generation numbers"
                );
                self.report.generation_gaps += gap as usize;
            }
        }

        for generation in generations {
            // Prefixes that already have a fallback in this generation
            let mut fallbacks = HashSet::new();
            for record in generation.manifest.iter().flatten() {
                self.add_service(&app.application, generation.number, record, &mut fallbacks);
            }
        }
    }

    fn add_service(
        &mut self,
        application: &str,
        generation: u64,
        record: &ServiceRecord,
        fallbacks: &mut HashSet<String>,
    ) {
        let (Some(service), Some(version)) =
            (non_empty(&record.service), non_empty(&record.version))
        else {
            tracing::warn!(
                application,
                generation,
                "Skipping manifest record without service or version"
            );
            self.report.malformed_records += 1;
            return;
        };

        let deployment = ServiceDeploymentRef::new(application, service, version);
        let prefix = deployment.prefix();

        self.intents.push(
            RouteIntent::new(prefix.clone(), Target::Single(deployment.clone()))
                .with_matcher(APP_VERSION_HEADER, generation.to_string()),
        );

        if fallbacks.insert(prefix.clone()) {
            self.intents
                .push(RouteIntent::new(prefix, Target::Single(deployment)));
        }

        for dependency in &record.dependencies {
            self.add_dependency(application, generation, dependency);
        }
    }

    fn add_dependency(&mut self, caller: &str, generation: u64, dependency: &DependencyRecord) {
        let (Some(service), Some(version)) =
            (non_empty(&dependency.service), non_empty(&dependency.version))
        else {
            tracing::warn!(
                application = caller,
                generation,
                "Skipping dependency without service or version"
            );
            self.report.malformed_records += 1;
            return;
        };
        let application = non_empty(&dependency.application).unwrap_or(caller);

        let deployment = ServiceDeploymentRef::new(application, service, version);
        let prefix = deployment.prefix();

        self.intents.push(
            RouteIntent::new(prefix.clone(), Target::Single(deployment.clone()))
                .with_matcher(APP_NAME_HEADER, caller)
                .with_matcher(APP_VERSION_HEADER, generation.to_string()),
        );
        self.intents.push(
            RouteIntent::new(prefix, Target::Single(deployment)).with_matcher(APP_NAME_HEADER, caller),
        );
    }

    fn add_overrides(&mut self, overrides: &[OverrideRecord], lookup: &VersionLookup) {
        let mut by_prefix: BTreeMap<String, Vec<&OverrideRecord>> = BTreeMap::new();
        for record in overrides {
            let Some(prefix) = record.prefix.as_deref().and_then(normalize_prefix) else {
                tracing::warn!(team_id = ?record.team_id, "Skipping override record without prefix");
                self.report.malformed_records += 1;
                continue;
            };
            by_prefix.entry(prefix).or_default().push(record);
        }

        for (prefix, mut records) in by_prefix {
            // One override per prefix. The lowest team id claims it.
            records.sort_by(|a, b| {
                team_rank(&a.team_id)
                    .cmp(&team_rank(&b.team_id))
                    .then_with(|| a.weighted_targets.cmp(&b.weighted_targets))
            });

            for conflicting in &records[1..] {
                tracing::warn!(
                    prefix = %prefix,
                    team_id = ?conflicting.team_id,
                    "Dropping conflicting override record"
                );
                self.report.dropped_overrides.push(prefix.clone());
            }

            self.add_override(prefix, records[0], lookup);
        }
    }

    fn add_override(&mut self, prefix: String, record: &OverrideRecord, lookup: &VersionLookup) {
        let mut members = Vec::with_capacity(record.weighted_targets.len());

        for target in &record.weighted_targets {
            let (Some(application), Some(service), Some(generation), Some(weight)) = (
                non_empty(&target.application),
                non_empty(&target.service),
                target.generation,
                target.weight,
            ) else {
                tracing::warn!(prefix = %prefix, "Skipping incomplete override target");
                self.report.malformed_records += 1;
                continue;
            };

            match lookup.resolve(application, generation, service) {
                Some(version) => members.push(WeightedTarget {
                    deployment: ServiceDeploymentRef::new(application, service, version),
                    weight,
                    generation,
                }),
                None => {
                    tracing::warn!(
                        prefix = %prefix,
                        application,
                        service,
                        generation,
                        "Dropping unresolvable override target"
                    );
                    self.report.dropped_targets += 1;
                }
            }
        }

        if members.is_empty() {
            tracing::warn!(prefix = %prefix, "Override has no resolvable targets, dropping it");
            self.report.dropped_overrides.push(prefix);
            return;
        }

        self.intents.push(
            RouteIntent::new(prefix, Target::Weighted(members))
                .custom()
                .overriding(),
        );
    }

    fn add_pin(&mut self, pin: &PinnedRouteRecord, lookup: &VersionLookup) {
        let (Some(prefix), Some(application), Some(service), Some(generation)) = (
            pin.prefix.as_deref().and_then(normalize_prefix),
            non_empty(&pin.application),
            non_empty(&pin.service),
            pin.generation,
        ) else {
            tracing::warn!(prefix = ?pin.prefix, "Skipping incomplete pinned route");
            self.report.malformed_records += 1;
            return;
        };

        let Some(version) = lookup.resolve(application, generation, service) else {
            tracing::warn!(
                prefix = %prefix,
                application,
                service,
                generation,
                "Dropping unresolvable pinned route"
            );
            self.report.dropped_pins.push(prefix);
            return;
        };

        self.intents.push(
            RouteIntent::new(
                prefix,
                Target::Single(ServiceDeploymentRef::new(application, service, version)),
            )
            .with_header_to_add(APP_NAME_HEADER, application)
            .with_header_to_add(APP_VERSION_HEADER, generation.to_string())
            .custom(),
        );
    }
}

/// Numeric team ids in numeric order, then non-numeric ones, then records
/// without a team.
fn team_rank(team_id: &Option<String>) -> (bool, bool, Option<u64>, Option<&str>) {
    let team = non_empty(team_id);
    let number = team.and_then(|t| t.parse::<u64>().ok());
    (team.is_none(), number.is_none(), number, team)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Store rows carry numbers as either JSON numbers or strings, and manifests
/// may carry unquoted versions. A value that does not fit is treated as absent
/// so the record counts as malformed instead of failing the whole scan.
mod lenient {
    use serde::de::IgnoredAny;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
        // Floats, booleans, lists and maps
        Other(IgnoredAny),
    }

    pub fn opt_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        Ok(match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Number(n)) => Some(n),
            Some(Raw::Text(s)) => s.trim().parse().ok(),
            Some(Raw::Other(_)) | None => None,
        })
    }

    pub fn opt_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        Ok(opt_u64(deserializer)?.and_then(|n| u32::try_from(n).ok()))
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Number(n)) => Some(n.to_string()),
            Some(Raw::Text(s)) => Some(s),
            Some(Raw::Other(_)) | None => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{application, dependency, override_record, pin, service};

    fn targets_of(intents: &[RouteIntent], prefix: &str) -> Vec<String> {
        intents
            .iter()
            .filter(|i| i.prefix == prefix)
            .map(|i| i.target.deployment_key())
            .collect()
    }

    #[test]
    fn test_single_service_emits_versioned_and_fallback() {
        let apps = vec![application("app1", vec![(1, vec![service("svc", "0.0.1")])])];
        let lookup = VersionLookup::from_manifests(&apps);
        let collection = collect(&apps, &[], &[], &lookup);

        assert_eq!(collection.intents.len(), 2);
        let versioned = &collection.intents[0];
        assert_eq!(versioned.prefix, "/app1/svc/");
        assert_eq!(versioned.header_matchers.get(APP_VERSION_HEADER).unwrap(), "1");
        assert!(!versioned.is_custom);

        let fallback = &collection.intents[1];
        assert!(fallback.header_matchers.is_empty());
        assert_eq!(fallback.target.deployment_key(), "app1-svc-0-0-1");
        assert_eq!(collection.report.intents_collected, 2);
    }

    #[test]
    fn test_fallback_emitted_per_generation() {
        let apps = vec![application(
            "app1",
            vec![
                (2, vec![service("svc", "0.0.2")]),
                (1, vec![service("svc", "0.0.1"), service("svc", "0.0.1")]),
            ],
        )];
        let lookup = VersionLookup::from_manifests(&apps);
        let collection = collect(&apps, &[], &[], &lookup);

        let fallbacks: Vec<_> = collection
            .intents
            .iter()
            .filter(|i| i.header_matchers.is_empty())
            .map(|i| i.target.deployment_key())
            .collect();
        // One per generation, in generation order
        assert_eq!(fallbacks, vec!["app1-svc-0-0-1", "app1-svc-0-0-2"]);
    }

    #[test]
    fn test_dependencies_emit_caller_scoped_routes() {
        let mut web = service("web", "1.0.0");
        web.dependencies = vec![
            dependency(Some("shared-app"), "auth", "2.1.0"),
            dependency(None, "api", "1.0.3"),
        ];
        let apps = vec![application("app1", vec![(3, vec![web])])];
        let lookup = VersionLookup::from_manifests(&apps);
        let collection = collect(&apps, &[], &[], &lookup);

        let auth: Vec<_> = collection
            .intents
            .iter()
            .filter(|i| i.prefix == "/shared-app/auth/")
            .collect();
        assert_eq!(auth.len(), 2);
        assert_eq!(
            auth[0].header_matchers.iter().collect::<Vec<_>>(),
            vec![
                (&APP_NAME_HEADER.to_string(), &"app1".to_string()),
                (&APP_VERSION_HEADER.to_string(), &"3".to_string()),
            ]
        );
        assert_eq!(auth[1].header_matchers.len(), 1);
        assert_eq!(auth[1].header_matchers.get(APP_NAME_HEADER).unwrap(), "app1");
        assert!(auth[1].headers_to_add.is_empty());

        // Dependencies without an application stay within the caller
        assert_eq!(
            targets_of(&collection.intents, "/app1/api/"),
            vec!["app1-api-1-0-3", "app1-api-1-0-3"]
        );
    }

    #[test]
    fn test_missing_generation_skips_application_only() {
        let mut apps = vec![
            application("app1", vec![(1, vec![service("svc", "0.0.1")])]),
            application("app2", vec![(1, vec![service("svc", "0.0.1")])]),
        ];
        apps[1].generations.push(Generation {
            number: 2,
            manifest: None,
        });

        let lookup = VersionLookup::from_manifests(&apps);
        let collection = collect(&apps, &[], &[], &lookup);

        assert_eq!(collection.report.missing_applications, vec!["app2"]);
        assert!(collection.intents.iter().all(|i| i.prefix == "/app1/svc/"));
        assert_eq!(collection.intents.len(), 2);
    }

    #[test]
    fn test_generation_gap_is_reported_not_fatal() {
        // History pruned up to generation 5, and generation 7 never landed
        let apps = vec![application(
            "app1",
            vec![
                (5, vec![service("svc", "0.0.5")]),
                (6, vec![service("svc", "0.0.6")]),
                (8, vec![service("svc", "0.0.8")]),
            ],
        )];
        let lookup = VersionLookup::from_manifests(&apps);
        let collection = collect(&apps, &[], &[], &lookup);

        assert_eq!(collection.report.generation_gaps, 1);
        assert!(collection.report.missing_applications.is_empty());
        // Versioned and fallback routes for every generation present
        assert_eq!(collection.intents.len(), 6);
    }

    #[test]
    fn test_malformed_records_are_counted() {
        let mut broken_dependency = service("web", "1.0.0");
        broken_dependency.dependencies = vec![DependencyRecord {
            application: Some("app2".into()),
            service: Some("api".into()),
            version: None,
        }];
        let apps = vec![application(
            "app1",
            vec![(
                1,
                vec![
                    ServiceRecord {
                        service: Some("svc".into()),
                        version: None,
                        dependencies: vec![],
                    },
                    broken_dependency,
                ],
            )],
        )];
        let lookup = VersionLookup::from_manifests(&apps);
        let collection = collect(&apps, &[], &[], &lookup);

        assert_eq!(collection.report.malformed_records, 2);
        // The web service itself is still routed
        assert_eq!(targets_of(&collection.intents, "/app1/web/").len(), 2);
    }

    #[test]
    fn test_override_drops_unresolvable_target() {
        let apps = vec![application(
            "app1",
            vec![
                (1, vec![service("svc", "0.0.1")]),
                (2, vec![service("svc", "0.0.2")]),
            ],
        )];
        let lookup = VersionLookup::from_manifests(&apps);
        let overrides = vec![override_record(
            "/app1/svc/",
            "1",
            &[("app1", "svc", 1, 70), ("app1", "svc", 2, 30), ("app1", "svc", 9, 10)],
        )];

        let collection = collect(&apps, &overrides, &[], &lookup);
        let custom: Vec<_> = collection.intents.iter().filter(|i| i.is_custom).collect();
        assert_eq!(custom.len(), 1);
        assert!(custom[0].is_override);

        let Target::Weighted(members) = &custom[0].target else {
            panic!("override must be weighted");
        };
        let weights: Vec<_> = members.iter().map(|m| (m.generation, m.weight)).collect();
        assert_eq!(weights, vec![(1, 70), (2, 30)]);
        assert_eq!(collection.report.dropped_targets, 1);
    }

    #[test]
    fn test_override_without_resolvable_targets_is_dropped() {
        let lookup = VersionLookup::default();
        let overrides = vec![override_record("/app1/svc/", "1", &[("app1", "svc", 4, 100)])];

        let collection = collect(&[], &overrides, &[], &lookup);
        assert!(collection.intents.is_empty());
        assert_eq!(collection.report.dropped_overrides, vec!["/app1/svc/"]);
        assert_eq!(collection.report.dropped_targets, 1);
    }

    #[test]
    fn test_one_override_per_prefix() {
        let mut lookup = VersionLookup::default();
        lookup.insert("app1", 1, "svc", "0.0.1");
        lookup.insert("app1", 2, "svc", "0.0.2");
        let overrides = vec![
            override_record("app1/svc", "7", &[("app1", "svc", 2, 100)]),
            override_record("/app1/svc/", "3", &[("app1", "svc", 1, 100)]),
        ];

        let collection = collect(&[], &overrides, &[], &lookup);
        assert_eq!(collection.intents.len(), 1);
        assert_eq!(collection.intents[0].prefix, "/app1/svc/");
        assert_eq!(collection.intents[0].target.deployment_key(), "app1-svc-0-0-1");
        assert_eq!(collection.report.dropped_overrides, vec!["/app1/svc/"]);
    }

    #[test]
    fn test_override_conflicts_compare_team_ids_numerically() {
        let mut lookup = VersionLookup::default();
        lookup.insert("app1", 1, "svc", "0.0.1");
        lookup.insert("app1", 2, "svc", "0.0.2");
        lookup.insert("app1", 3, "svc", "0.0.3");
        let mut teamless = override_record("/app1/svc/", "", &[("app1", "svc", 3, 100)]);
        teamless.team_id = None;
        let overrides = vec![
            teamless,
            override_record("/app1/svc/", "10", &[("app1", "svc", 2, 100)]),
            override_record("/app1/svc/", "7", &[("app1", "svc", 1, 100)]),
        ];

        let collection = collect(&[], &overrides, &[], &lookup);
        assert_eq!(collection.intents.len(), 1);
        assert_eq!(collection.intents[0].target.deployment_key(), "app1-svc-0-0-1");
        assert_eq!(collection.report.dropped_overrides.len(), 2);
    }

    #[test]
    fn test_team_rank() {
        let mut ranked = vec![
            None,
            Some("ops".to_string()),
            Some("10".to_string()),
            Some("7".to_string()),
        ];
        ranked.sort_by(|a, b| team_rank(a).cmp(&team_rank(b)));
        assert_eq!(
            ranked,
            vec![
                Some("7".to_string()),
                Some("10".to_string()),
                Some("ops".to_string()),
                None,
            ]
        );
    }

    #[test]
    fn test_unquoted_versions_decode() {
        let records: Vec<ServiceRecord> = serde_yaml::from_str(
            r#"
            - {service: svc, version: 0.0.1}
            - {service: api, version: 2}
            - {service: web, version: 1.0}
            "#,
        )
        .unwrap();

        assert_eq!(records[0].version.as_deref(), Some("0.0.1"));
        assert_eq!(records[1].version.as_deref(), Some("2"));
        // A float cannot be turned back into the written version
        assert_eq!(records[2].version, None);

        let apps = vec![application("app1", vec![(1, records)])];
        let lookup = VersionLookup::from_manifests(&apps);
        let collection = collect(&apps, &[], &[], &lookup);
        assert_eq!(collection.report.malformed_records, 1);
        assert_eq!(targets_of(&collection.intents, "/app1/svc/").len(), 2);
        assert_eq!(
            targets_of(&collection.intents, "/app1/api/"),
            vec!["app1-api-2", "app1-api-2"]
        );
    }

    #[test]
    fn test_pinned_route_injects_headers() {
        let mut lookup = VersionLookup::default();
        lookup.insert("app1", 4, "mfe", "1.2.0");
        let pins = vec![pin("/app1/", "app1", "mfe", 4), pin("/gone/", "app1", "mfe", 5)];

        let collection = collect(&[], &[], &pins, &lookup);
        assert_eq!(collection.intents.len(), 1);

        let pinned = &collection.intents[0];
        assert!(pinned.is_custom);
        assert!(!pinned.is_override);
        assert!(pinned.header_matchers.is_empty());
        assert_eq!(pinned.headers_to_add.get(APP_NAME_HEADER).unwrap(), "app1");
        assert_eq!(pinned.headers_to_add.get(APP_VERSION_HEADER).unwrap(), "4");
        assert_eq!(collection.report.dropped_pins, vec!["/gone/"]);
    }

    #[test]
    fn test_record_deserialization() {
        let record: OverrideRecord = serde_json::from_value(serde_json::json!({
            "prefix": "/app1/svc/",
            "team_id": 12,
            "targets": [
                {"app": "app1", "svc": "svc", "app_ver": "2", "weight": "30"},
                {"app": "app1", "svc": "svc", "app_ver": "three", "weight": 70}
            ]
        }))
        .unwrap();

        assert_eq!(record.team_id.as_deref(), Some("12"));
        assert_eq!(record.weighted_targets[0].generation, Some(2));
        assert_eq!(record.weighted_targets[0].weight, Some(30));
        // Unparseable numbers are treated as missing
        assert_eq!(record.weighted_targets[1].generation, None);

        let service: ServiceRecord = serde_yaml::from_str(
            r#"
            svc: web
            ver: 1.0.0
            depends_on:
              - app: shared-app
                svc: auth
                ver: 2.0.0
            "#,
        )
        .unwrap();
        assert_eq!(service.service.as_deref(), Some("web"));
        assert_eq!(service.dependencies.len(), 1);
    }
}
