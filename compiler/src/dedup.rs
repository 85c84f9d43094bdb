//! Signature Deduplicator
//!
//! Reduces the collected intents to one winner per [`RoutingSignature`].
//!
//! Precedence, highest first:
//!
//! 1. custom intents (overrides and pinned routes) beat derived ones
//! 2. between two custom intents, an override beats a pin
//! 3. the greater target under the configured [`TieBreak`] ("latest wins")
//!
//! Anything still equal after that is ordered by the remaining fields so the
//! winner never depends on input order.

use crate::model::{RouteIntent, RoutingSignature, ServiceDeploymentRef, Target};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// How competing targets of the same signature are ranked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Compare deployment identifiers as strings. `0-0-9` beats `0-0-10`.
    #[default]
    Lexicographic,
    /// Compare single-target versions as semantic versions. Versions that do
    /// not parse rank below every version that does, and compare as strings
    /// among themselves.
    Semantic,
}

impl TieBreak {
    pub fn compare(self, a: &Target, b: &Target) -> Ordering {
        match (self, a, b) {
            (TieBreak::Semantic, Target::Single(a), Target::Single(b)) => {
                VersionRank::of(a)
                    .cmp(&VersionRank::of(b))
                    .then_with(|| a.deployment_id().cmp(&b.deployment_id()))
            }
            _ => a.deployment_key().cmp(&b.deployment_key()),
        }
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum VersionRank {
    Text(String),
    Semantic(semver::Version),
}

impl VersionRank {
    fn of(deployment: &ServiceDeploymentRef) -> Self {
        let raw = deployment.version.trim();
        let candidate = raw.strip_prefix('v').unwrap_or(raw);
        match semver::Version::parse(candidate) {
            Ok(version) => VersionRank::Semantic(version),
            Err(_) => VersionRank::Text(deployment.deployment_id().to_string()),
        }
    }
}

/// Orders two intents sharing a signature. `Greater` means `a` wins.
pub fn precedence(a: &RouteIntent, b: &RouteIntent, tie_break: TieBreak) -> Ordering {
    a.is_custom
        .cmp(&b.is_custom)
        .then_with(|| {
            if a.is_custom && b.is_custom {
                a.is_override.cmp(&b.is_override)
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| tie_break.compare(&a.target, &b.target))
        .then_with(|| residual_key(a).cmp(&residual_key(b)))
}

type ResidualKey<'a> = (bool, Vec<(&'a String, &'a String)>, Vec<&'a String>, &'a Target);

fn residual_key(intent: &RouteIntent) -> ResidualKey<'_> {
    (
        intent.is_override,
        intent.headers_to_add.iter().collect(),
        intent.header_matchers.keys().collect(),
        &intent.target,
    )
}

/// Keeps exactly one intent per signature. The result is ordered by
/// signature, which the sorter then refines.
pub fn deduplicate(intents: Vec<RouteIntent>, tie_break: TieBreak) -> Vec<RouteIntent> {
    let mut winners: BTreeMap<RoutingSignature, RouteIntent> = BTreeMap::new();

    for intent in intents {
        match winners.entry(intent.signature()) {
            Entry::Vacant(entry) => {
                entry.insert(intent);
            }
            Entry::Occupied(mut entry) => {
                if precedence(&intent, entry.get(), tie_break) == Ordering::Greater {
                    tracing::trace!(
                        prefix = %intent.prefix,
                        winner = %intent.target.deployment_key(),
                        loser = %entry.get().target.deployment_key(),
                        "Replacing route for signature"
                    );
                    entry.insert(intent);
                }
            }
        }
    }

    winners.into_values().collect()
}
