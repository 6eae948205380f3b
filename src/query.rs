//! Fan-out query planning and merge
//!
//! Stream range queries span many streams on many hosts. Planning partitions
//! the requested `key@host` references into one batch per host, sorted by
//! host string so that request order, and therefore merge tie-breaking, is
//! deterministic. The merge is the only place global ordering is
//! established: concatenate, sort descending by timestamp, deduplicate by id
//! keeping the first occurrence, cap the result.

use std::collections::BTreeMap;
use std::collections::HashSet;

use tracing::warn;

use crate::model::StreamElement;

/// Results of recent/range queries never exceed this many elements
pub const MAX_ELEMENTS: usize = 16;

/// Split a stream reference into its key and optional host suffix.
pub fn split_stream_ref(reference: &str) -> (&str, Option<&str>) {
    match reference.split_once('@') {
        Some((key, host)) => (key, Some(host)),
        None => (reference, None),
    }
}

/// Partition stream references into per-host batches.
///
/// References without an explicit host suffix fall back to `default_host`.
/// An empty host key is a malformed reference: it is skipped with a warning
/// rather than failing the whole query.
pub fn partition_streams(references: &[String], default_host: &str) -> BTreeMap<String, Vec<String>> {
    let mut plan: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for reference in references {
        let (key, host) = split_stream_ref(reference);
        let host = host.unwrap_or(default_host);

        if host.is_empty() {
            warn!(reference = %reference, "stream reference has no resolvable host, skipping");
            continue;
        }

        plan.entry(host.to_string()).or_default().push(key.to_string());
    }

    plan
}

/// Ordering value of a stream-element timestamp: two dash-joined integer
/// components treated as one decimal number (`"10-5"` → 10.5). Comparison is
/// numeric, not lexicographic.
pub fn timestamp_value(timestamp: &str) -> f64 {
    timestamp.replacen('-', ".", 1).parse().unwrap_or(0.0)
}

/// Merge per-host result batches into one globally ordered sequence:
/// descending by timestamp (stable, so equal timestamps keep first-seen
/// order), deduplicated by id keeping the first occurrence, at most
/// [`MAX_ELEMENTS`] entries.
pub fn merge_elements(batches: Vec<Vec<StreamElement>>) -> Vec<StreamElement> {
    let mut elements: Vec<StreamElement> = batches.into_iter().flatten().collect();

    elements.sort_by(|a, b| {
        timestamp_value(&b.timestamp)
            .partial_cmp(&timestamp_value(&a.timestamp))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen = HashSet::new();
    elements.retain(|element| seen.insert(element.id.clone()));

    elements.truncate(MAX_ELEMENTS);
    elements
}
