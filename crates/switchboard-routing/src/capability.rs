//! Capability filtering.

use std::collections::BTreeSet;
use switchboard_core::{Candidate, Capability};

/// Candidates declaring every required capability; all of them when none are required.
pub fn filter_by_capabilities(
    candidates: &[Candidate],
    required: &BTreeSet<Capability>,
) -> Vec<Candidate> {
    if required.is_empty() {
        return candidates.to_vec();
    }
    candidates
        .iter()
        .filter(|candidate| candidate.supports_all(required))
        .cloned()
        .collect()
}

/// Formats capabilities as `[a, b]` for decision logs.
pub fn describe_capabilities(required: &BTreeSet<Capability>) -> String {
    let names: Vec<&str> = required.iter().map(|capability| capability.as_str()).collect();
    format!("[{}]", names.join(", "))
}
