//! Common test utilities for switchboard-routing tests
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

use async_trait::async_trait;
use core::sync::atomic::{AtomicUsize, Ordering};
use core::time::Duration;
use std::collections::{HashMap, VecDeque};
use std::env;
use std::sync::{Arc, Mutex, Once};
use switchboard_core::{
    Candidate, Capability, DeclaredPrice, DetectorConfig, IgnoreLock as _, ProbeOutcome,
    ProbePayload, ProbeTarget, ProbeTransport, TierRecord,
};
use switchboard_routing::{CircuitBreaker, ModelSelector, StaticCatalog};
use tokio::time::sleep;
use tracing_subscriber::{EnvFilter, fmt};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests (idempotent).
/// Honors `RUST_LOG` if set, otherwise defaults to "debug".
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_owned());
        if fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_test_writer()
            .try_init()
            .is_err()
        {
            // tracing already initialized in this process
        }
    });
}

/// The two-candidate catalog used by the selection scenarios.
pub fn scenario_catalog() -> Vec<Candidate> {
    vec![
        Candidate::new("A")
            .with_score(1200.0)
            .with_capabilities([Capability::TextInput])
            .with_provider("groq"),
        Candidate::new("B")
            .with_score(1100.0)
            .with_capabilities([Capability::TextInput, Capability::ImageInput])
            .with_provider("gemini"),
    ]
}

/// Selector over `candidates` sharing a fresh breaker.
pub fn selector_over(candidates: Vec<Candidate>) -> (ModelSelector, Arc<CircuitBreaker>) {
    let breaker = Arc::new(CircuitBreaker::default());
    let selector = ModelSelector::new(
        Arc::new(StaticCatalog::new(candidates)),
        Arc::clone(&breaker),
    );
    (selector, breaker)
}

/// Detector settings without delays, so tests run fast.
pub fn fast_detector_config() -> DetectorConfig {
    DetectorConfig {
        sequential_delay_ms: 0,
        retry_backoff_ms: 1,
        concurrent_probe_timeout_ms: 1_000,
        sequential_probe_timeout_ms: 1_000,
        ..DetectorConfig::default()
    }
}

/// Sort records by key for stable comparisons.
pub fn sorted(records: &HashMap<String, TierRecord>) -> Vec<(String, TierRecord)> {
    let mut pairs: Vec<(String, TierRecord)> = records
        .iter()
        .map(|(key, record)| (key.clone(), record.clone()))
        .collect();
    pairs.sort_by(|left, right| left.0.cmp(&right.0));
    pairs
}

/// Probe transport with scripted outcomes and call counters.
///
/// Outcomes are scripted per model as a queue; the last outcome repeats.
/// Unscripted models succeed without quota headers.
#[derive(Default)]
pub struct ScriptedTransport {
    outcomes: Mutex<HashMap<String, VecDeque<ProbeOutcome>>>,
    pricing: Option<Vec<DeclaredPrice>>,
    pricing_service: String,
    delay: Duration,
    probes: AtomicUsize,
    pricing_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    probed_models: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    /// Transport where every probe succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcomes of `model`.
    pub fn with_outcomes(self, model: &str, outcomes: Vec<ProbeOutcome>) -> Self {
        self.outcomes
            .lock_ignore_poison()
            .insert(model.to_owned(), outcomes.into());
        self
    }

    /// Serve a declared pricing listing for `service`.
    pub fn with_pricing(mut self, service: &str, pricing: Vec<DeclaredPrice>) -> Self {
        self.pricing_service = service.to_owned();
        self.pricing = Some(pricing);
        self
    }

    /// Hold every probe for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Probes sent so far.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Pricing listings fetched so far.
    pub fn pricing_count(&self) -> usize {
        self.pricing_calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous probes seen.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Models probed, in call order.
    pub fn probed_models(&self) -> Vec<String> {
        self.probed_models.lock_ignore_poison().clone()
    }

    fn next_outcome(&self, model: &str) -> ProbeOutcome {
        let mut outcomes = self.outcomes.lock_ignore_poison();
        match outcomes.get_mut(model) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => ProbeOutcome::Success { quota: None },
        }
    }
}

#[async_trait]
impl ProbeTransport for ScriptedTransport {
    fn supports(&self, service: &str) -> bool {
        service != "unsupported"
    }

    async fn probe(&self, target: ProbeTarget<'_>, _payload: &ProbePayload) -> ProbeOutcome {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.probed_models
            .lock_ignore_poison()
            .push(target.model.to_owned());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.next_outcome(target.model)
    }

    async fn declared_pricing(&self, service: &str, _credential: &str) -> Option<Vec<DeclaredPrice>> {
        if service != self.pricing_service {
            return None;
        }
        self.pricing_calls.fetch_add(1, Ordering::SeqCst);
        self.pricing.clone()
    }
}
