//! Route reconciliation and edge-proxy configuration compiler.
//!
//! ```text
//!  manifests ─┐
//!  overrides ─┼─► collect ─► deduplicate ─► sort ─► resolve ─► render ─► detect_change
//!  pins ──────┘                                       ▲
//!                                         registry ───┘
//! ```
//!
//! [`compile`] is a pure function of a [`Snapshot`]: the same snapshot and
//! configuration always produce the same table, byte for byte.

pub mod change;
pub mod clusters;
pub mod collector;
pub mod config;
pub mod dedup;
pub mod errors;
pub mod metrics_defs;
pub mod model;
pub mod registry;
pub mod render;
pub mod report;
pub mod sorter;

#[cfg(test)]
mod testutils;

use crate::clusters::{ClusterDef, CompiledRoute};
use crate::collector::{
    ApplicationManifests, Collection, OverrideRecord, PinnedRouteRecord, VersionLookup,
};
use crate::config::CompilerConfig;
use crate::metrics_defs::{
    CLUSTERS_EMITTED, COMPILE_DURATION, INTENTS_COLLECTED, RECORDS_SKIPPED, REGISTRY_MISSES,
    ROUTES_EMITTED,
};
use crate::registry::RegistrySnapshot;
use crate::render::ProxyConfig;
use crate::report::CompileReport;
use shared::{counter, gauge, histogram};
use std::collections::HashSet;
use std::time::Instant;

/// Everything a compilation run reads, materialized up front.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub applications: Vec<ApplicationManifests>,
    pub overrides: Vec<OverrideRecord>,
    pub pins: Vec<PinnedRouteRecord>,
    pub registry: RegistrySnapshot,
}

/// The terminal rule for requests no route matched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatchAll {
    pub status: u16,
    pub body: String,
}

impl Default for CatchAll {
    fn default() -> Self {
        let config = config::CatchAllConfig::default();
        CatchAll {
            status: config::CATCH_ALL_STATUS,
            body: config.body,
        }
    }
}

/// Routes in match order, clusters sorted by identifier, then the catch-all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledTable {
    pub routes: Vec<CompiledRoute>,
    pub clusters: Vec<ClusterDef>,
    pub catch_all: CatchAll,
}

#[derive(Clone, Debug)]
pub struct Compilation {
    pub table: CompiledTable,
    pub proxy_config: ProxyConfig,
    pub report: CompileReport,
}

pub fn compile(snapshot: &Snapshot, config: &CompilerConfig) -> Compilation {
    let started = Instant::now();

    let lookup = VersionLookup::from_manifests(&snapshot.applications);
    let Collection {
        intents,
        mut report,
    } = collector::collect(
        &snapshot.applications,
        &snapshot.overrides,
        &snapshot.pins,
        &lookup,
    );

    let mut winners = dedup::deduplicate(intents, config.tie_break);
    debug_assert!(
        signatures_unique(&winners),
        "deduplicated routes share a signature"
    );

    sorter::sort_intents(&mut winners);
    debug_assert!(
        sorter::is_strictly_sorted(&winners),
        "routes are not in total order"
    );

    let (routes, clusters) =
        clusters::resolve(winners, &snapshot.registry, &config.clusters, &mut report);
    report.routes_emitted = routes.len();
    report.clusters_emitted = clusters.len();

    let table = CompiledTable {
        routes,
        clusters,
        catch_all: CatchAll {
            status: config::CATCH_ALL_STATUS,
            body: config.catch_all.body.clone(),
        },
    };
    let proxy_config = render::render(&table, config);
    debug_assert!(
        proxy_config.ends_with_catch_all(),
        "rendered routes do not end with the catch-all"
    );

    record_metrics(&report);
    histogram!(COMPILE_DURATION).record(started.elapsed().as_secs_f64());

    if report.is_complete() {
        tracing::info!(
            intents = report.intents_collected,
            routes = report.routes_emitted,
            clusters = report.clusters_emitted,
            "Compiled routing table"
        );
    } else {
        tracing::warn!(
            intents = report.intents_collected,
            routes = report.routes_emitted,
            clusters = report.clusters_emitted,
            malformed = report.malformed_records,
            missing_applications = ?report.missing_applications,
            generation_gaps = report.generation_gaps,
            dropped_targets = report.dropped_targets,
            dropped_overrides = ?report.dropped_overrides,
            dropped_pins = ?report.dropped_pins,
            "Compiled routing table from incomplete input"
        );
    }

    Compilation {
        table,
        proxy_config,
        report,
    }
}

fn signatures_unique(intents: &[model::RouteIntent]) -> bool {
    let mut seen = HashSet::with_capacity(intents.len());
    intents.iter().all(|intent| seen.insert(intent.signature()))
}

fn record_metrics(report: &CompileReport) {
    gauge!(INTENTS_COLLECTED).set(report.intents_collected as f64);
    gauge!(ROUTES_EMITTED).set(report.routes_emitted as f64);
    gauge!(CLUSTERS_EMITTED).set(report.clusters_emitted as f64);
    counter!(REGISTRY_MISSES).increment(report.registry_misses as u64);

    let skipped = [
        ("malformed", report.malformed_records),
        ("missing_application", report.missing_applications.len()),
        ("generation_gap", report.generation_gaps),
        ("dropped_target", report.dropped_targets),
        ("dropped_override", report.dropped_overrides.len()),
        ("dropped_pin", report.dropped_pins.len()),
        ("invalid_registry_entry", report.invalid_registry_entries),
    ];
    for (reason, count) in skipped {
        if count > 0 {
            counter!(RECORDS_SKIPPED, "reason" => reason).increment(count as u64);
        }
    }
}
