//! Total-Order Sorter
//!
//! Orders the deduplicated intents so the rendered table is byte-for-byte
//! reproducible. Within a prefix, routes with more header constraints come
//! first so a request carrying `X-App-Version` is matched before the
//! version-less fallback.
//!
//! ```text
//! /app1/svc/  {X-App-Name: app2, X-App-Version: 1}
//! /app1/svc/  {X-App-Name: app2}
//! /app1/svc/  {X-App-Version: 1}
//! /app1/svc/  {X-App-Version: 2}
//! /app1/svc/  {}
//! ```

use crate::model::{APP_NAME_HEADER, APP_VERSION_HEADER, Headers, RouteIntent};
use std::cmp::Reverse;

/// Header value that sorts before "no value".
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum NameKey<'a> {
    Present(&'a str),
    Absent,
}

/// Generation header value. Numbers compare numerically, anything else sorts
/// after every number, and a missing header sorts last.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum VersionKey<'a> {
    Numeric(u64),
    Text(&'a str),
    Absent,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct SortKey<'a> {
    prefix: &'a str,
    matcher_count: Reverse<usize>,
    matcher_name: NameKey<'a>,
    matcher_version: VersionKey<'a>,
    added_name: NameKey<'a>,
    added_version: VersionKey<'a>,
    has_headers_to_add: bool,
    is_override: bool,
    deployment_key: String,
    // Distinguishes matchers on headers other than the two above
    matcher_values: Vec<&'a str>,
}

impl<'a> SortKey<'a> {
    fn of(intent: &'a RouteIntent) -> Self {
        SortKey {
            prefix: &intent.prefix,
            matcher_count: Reverse(intent.header_matchers.len()),
            matcher_name: name_key(&intent.header_matchers),
            matcher_version: version_key(&intent.header_matchers),
            added_name: name_key(&intent.headers_to_add),
            added_version: version_key(&intent.headers_to_add),
            has_headers_to_add: !intent.headers_to_add.is_empty(),
            is_override: intent.is_override,
            deployment_key: intent.target.deployment_key(),
            matcher_values: intent.header_matchers.values().map(String::as_str).collect(),
        }
    }
}

fn name_key(headers: &Headers) -> NameKey<'_> {
    match headers.get(APP_NAME_HEADER) {
        Some(name) => NameKey::Present(name),
        None => NameKey::Absent,
    }
}

fn version_key(headers: &Headers) -> VersionKey<'_> {
    match headers.get(APP_VERSION_HEADER) {
        Some(value) => match value.trim().parse() {
            Ok(number) => VersionKey::Numeric(number),
            Err(_) => VersionKey::Text(value),
        },
        None => VersionKey::Absent,
    }
}

pub fn sort_intents(intents: &mut [RouteIntent]) {
    intents.sort_by(|a, b| SortKey::of(a).cmp(&SortKey::of(b)));
}

/// Whether every route strictly precedes the next one.
pub fn is_strictly_sorted(intents: &[RouteIntent]) -> bool {
    intents
        .windows(2)
        .all(|pair| SortKey::of(&pair[0]) < SortKey::of(&pair[1]))
}
