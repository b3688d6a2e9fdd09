//! In-process token accounting.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use switchboard_core::{IgnoreLock as _, TierRecord, TokenUsage, UsageRecorder};

/// Aggregated usage of one `service:model` pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageTotals {
    /// Successful completions.
    pub requests: u64,
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Completion tokens.
    pub output_tokens: u64,
}

/// Usage recorder aggregating per `service:model`.
#[derive(Debug, Default)]
pub struct UsageLedger {
    /// Totals keyed by `service:model`.
    totals: Mutex<HashMap<String, UsageTotals>>,
}

impl UsageLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Totals of one model.
    pub fn get(&self, service: &str, model: &str) -> Option<UsageTotals> {
        self.totals
            .lock_ignore_poison()
            .get(&TierRecord::model_key(service, model))
            .copied()
    }

    /// Copy of every total.
    pub fn totals(&self) -> HashMap<String, UsageTotals> {
        self.totals.lock_ignore_poison().clone()
    }

    /// Clears all totals.
    pub fn reset(&self) {
        self.totals.lock_ignore_poison().clear();
    }
}

impl UsageRecorder for UsageLedger {
    fn record_usage(&self, service: &str, model: &str, usage: TokenUsage) {
        let mut totals = self.totals.lock_ignore_poison();
        let entry = totals.entry(TierRecord::model_key(service, model)).or_default();
        entry.requests = entry.requests.saturating_add(1);
        entry.input_tokens = entry.input_tokens.saturating_add(usage.input);
        entry.output_tokens = entry.output_tokens.saturating_add(usage.output);
        tracing::trace!(
            "Usage for {service}:{model}: {} tokens ({} requests)",
            entry.input_tokens.saturating_add(entry.output_tokens),
            entry.requests
        );
    }
}
