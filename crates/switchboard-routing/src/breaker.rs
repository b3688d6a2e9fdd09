//! Per-model circuit breaker.
//!
//! Each model id owns a small state machine:
//!
//! ```text
//! Closed   --(threshold failures | billing or quota failure)--> Open
//! Open     --(recovery timeout elapsed, observed on read)------> HalfOpen
//! HalfOpen --(failure)-------------------------------------------> Open
//! any      --(success)-------------------------------------------> entry removed
//! ```
//!
//! A model with no entry is closed. Entries live in a [`DashMap`] so a failure
//! update on one model never serializes readers of another.

use chrono::{DateTime, Utc};
use core::fmt;
use core::time::Duration;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use switchboard_core::{BreakerConfig, FailureReason};
use tracing::{debug, info, warn};

/// Circuit state of one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow normally.
    #[default]
    Closed,
    /// Calls are blocked until the recovery timeout elapses.
    Open,
    /// Recovery window; the next failure reopens the circuit.
    HalfOpen,
}

impl CircuitState {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Failure bookkeeping of one model.
#[derive(Debug, Clone, Default)]
pub struct CircuitEntry {
    /// Failures since the last success.
    pub failure_count: u32,
    /// Monotonic time of the last failure.
    pub last_failure: Option<Instant>,
    /// Wall-clock time of the last failure, for reporting.
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Current state.
    pub state: CircuitState,
    /// Reason attached to the last failure.
    pub last_reason: Option<FailureReason>,
}

/// Circuit breaker keyed by model id.
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Entries of models that failed since their last success.
    circuits: DashMap<String, CircuitEntry>,
    /// Failures that open a closed circuit.
    failure_threshold: u32,
    /// Time an open circuit stays blocked.
    recovery_timeout: Duration,
    /// Optional cap on tracked models.
    max_entries: Option<usize>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(&BreakerConfig::default())
    }
}

impl CircuitBreaker {
    /// Creates a breaker from configuration.
    pub fn new(config: &BreakerConfig) -> Self {
        Self {
            circuits: DashMap::new(),
            failure_threshold: config.failure_threshold.max(1),
            recovery_timeout: config.recovery_timeout(),
            max_entries: config.max_entries,
        }
    }

    /// Creates a breaker with explicit settings and no entry cap.
    pub fn with_settings(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            circuits: DashMap::new(),
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            max_entries: None,
        }
    }

    /// Whether calls to `model_id` may proceed.
    ///
    /// An open circuit whose recovery timeout has elapsed moves to half-open
    /// here, which is the only place that transition happens.
    pub fn is_available(&self, model_id: &str) -> bool {
        let Some(mut entry) = self.circuits.get_mut(model_id) else {
            return true;
        };

        match entry.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let recovered = entry
                    .last_failure
                    .is_none_or(|at| at.elapsed() > self.recovery_timeout);
                if recovered {
                    entry.state = CircuitState::HalfOpen;
                    info!("Circuit for {model_id} is half-open, allowing a recovery attempt");
                }
                recovered
            }
        }
    }

    /// Clears all failure state of `model_id`.
    pub fn record_success(&self, model_id: &str) {
        if let Some((_, entry)) = self.circuits.remove(model_id) {
            debug!(
                "Circuit for {model_id} closed after success (was {}, {} failures)",
                entry.state, entry.failure_count
            );
        }
    }

    /// Records a failure of `model_id`; a missing reason counts as unknown.
    pub fn record_failure(&self, model_id: &str, reason: Option<FailureReason>) {
        let reason = reason.unwrap_or(FailureReason::UnknownError);
        {
            let mut entry = self.circuits.entry(model_id.to_owned()).or_default();
            entry.failure_count = entry.failure_count.saturating_add(1);
            entry.last_failure = Some(Instant::now());
            entry.last_failure_at = Some(Utc::now());
            entry.last_reason = Some(reason);

            if entry.state == CircuitState::HalfOpen {
                entry.state = CircuitState::Open;
                warn!("Recovery attempt for {model_id} failed ({reason}), circuit reopened");
            } else if entry.state == CircuitState::Closed
                && (entry.failure_count >= self.failure_threshold || reason.opens_immediately())
            {
                entry.state = CircuitState::Open;
                warn!(
                    "Circuit for {model_id} opened after {} failures (last: {reason})",
                    entry.failure_count
                );
            } else {
                debug!(
                    "Failure {} recorded for {model_id} ({reason}), circuit {}",
                    entry.failure_count, entry.state
                );
            }
        }
        self.evict_oldest(model_id);
    }

    /// Current state of `model_id` without triggering recovery.
    pub fn state(&self, model_id: &str) -> CircuitState {
        self.circuits
            .get(model_id)
            .map_or(CircuitState::Closed, |entry| entry.state)
    }

    /// Copy of the entry of `model_id`, if it has failed since its last success.
    pub fn entry(&self, model_id: &str) -> Option<CircuitEntry> {
        self.circuits.get(model_id).map(|entry| entry.clone())
    }

    /// Copy of every tracked entry.
    pub fn snapshot(&self) -> HashMap<String, CircuitEntry> {
        self.circuits
            .iter()
            .map(|item| (item.key().clone(), item.value().clone()))
            .collect()
    }

    /// Forgets `model_id`, returning whether it was tracked.
    pub fn reset(&self, model_id: &str) -> bool {
        self.circuits.remove(model_id).is_some()
    }

    /// Forgets every model.
    pub fn reset_all(&self) {
        self.circuits.clear();
    }

    /// Number of tracked models.
    pub fn len(&self) -> usize {
        self.circuits.len()
    }

    /// Whether no model is tracked.
    pub fn is_empty(&self) -> bool {
        self.circuits.is_empty()
    }

    /// Drops the entries with the oldest failures once the cap is exceeded.
    fn evict_oldest(&self, keep: &str) {
        let Some(max_entries) = self.max_entries else {
            return;
        };

        while self.circuits.len() > max_entries {
            let oldest = self
                .circuits
                .iter()
                .filter(|item| item.key() != keep)
                .min_by_key(|item| item.value().last_failure)
                .map(|item| item.key().clone());
            let Some(oldest) = oldest else {
                break;
            };
            self.circuits.remove(&oldest);
            debug!("Evicted circuit entry for {oldest}");
        }
    }
}
