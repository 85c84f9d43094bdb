use serde::Serialize;

/// Counts of everything a compilation run skipped, dropped or defaulted.
///
/// None of these fail the run. They are surfaced so the caller can log and
/// alert on a table that was built from incomplete input.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CompileReport {
    /// Manifest, dependency, override, target or pin records missing a
    /// required field.
    pub malformed_records: usize,
    /// Applications whose contribution was skipped because a generation
    /// manifest was missing.
    pub missing_applications: Vec<String>,
    /// Generation numbers absent between an application's oldest and newest
    /// loaded generation. The generations that exist are still routed.
    pub generation_gaps: usize,
    /// Weighted target references that did not resolve to a version.
    pub dropped_targets: usize,
    /// Override prefixes that produced no route, either because no target
    /// resolved or because another record already claimed the prefix.
    pub dropped_overrides: Vec<String>,
    /// Pinned route prefixes whose reference did not resolve.
    pub dropped_pins: Vec<String>,
    /// Deployment identifiers with no registry entry.
    pub registry_misses: usize,
    /// Registry entries that could not be used, e.g. serverless without a hostname.
    pub invalid_registry_entries: usize,
    pub intents_collected: usize,
    pub routes_emitted: usize,
    pub clusters_emitted: usize,
}

impl CompileReport {
    /// Whether the run consumed every input without any loss.
    pub fn is_complete(&self) -> bool {
        self.malformed_records == 0
            && self.missing_applications.is_empty()
            && self.generation_gaps == 0
            && self.dropped_targets == 0
            && self.dropped_overrides.is_empty()
            && self.dropped_pins.is_empty()
            && self.invalid_registry_entries == 0
    }
}
