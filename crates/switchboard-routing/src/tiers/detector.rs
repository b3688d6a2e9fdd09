//! Probe orchestration and cache coverage.
//!
//! Providers listed as concurrent are probed through a semaphore-bounded
//! task set; every other provider is probed one model at a time with a short
//! delay between calls. Each attempt is bounded by a timeout, and timeouts or
//! unclassified failures are retried with linear backoff before the model is
//! recorded as unknown. The detector never fails: every requested model gets
//! a best-effort record.

use core::time::Duration;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use switchboard_core::{
    Category, DeclaredPrice, DetectionMethod, DetectorConfig, ProbeOutcome, ProbePayload,
    ProbeTarget, ProbeTransport, TierRecord,
};
use switchboard_providers::placeholders::{audio_probe, image_probe, text_probe};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use super::cache::{TierCache, TierCacheEntry};
use super::classify::{self, FREE_SUFFIX};
use super::{ModelSpec, ProviderPayload};

/// Probes single models with timeout and retry.
#[derive(Clone)]
struct ModelProber {
    /// Network transport.
    transport: Arc<dyn ProbeTransport>,
    /// Per-attempt timeout.
    attempt_timeout: Duration,
    /// Extra attempts after a retryable outcome.
    max_retries: u32,
    /// Backoff step; attempt `n` waits `n * backoff`.
    backoff: Duration,
    /// Whether unsupported video models of this service are assumed paid.
    assume_paid_video: bool,
}

impl ModelProber {
    /// Classifies one model, preferring the free suffix and declared pricing over probing.
    async fn detect(
        &self,
        service: &str,
        credential: &str,
        spec: &ModelSpec,
        pricing: Option<&[DeclaredPrice]>,
    ) -> TierRecord {
        if let Some(record) = classify::from_free_suffix(service, spec) {
            return record;
        }
        if let Some(price) =
            pricing.and_then(|listing| listing.iter().find(|price| price.model == spec.name))
        {
            return classify::from_declared_price(service, spec, price);
        }

        let target = ProbeTarget {
            service,
            credential,
            model: &spec.name,
        };
        match spec.category {
            Category::Image | Category::Vision => {
                let outcome = self.attempt(target, &image_probe()).await;
                if matches!(outcome, ProbeOutcome::Unsupported | ProbeOutcome::Failed(_)) {
                    debug!("Image probe of {service}:{} rejected, trying text", spec.name);
                    let fallback = self.attempt(target, &text_probe()).await;
                    classify::from_text_fallback(service, spec, &fallback)
                } else {
                    classify::from_outcome(service, spec, &outcome, DetectionMethod::TestRequestImage)
                }
            }
            Category::Audio => {
                let outcome = self.attempt(target, &audio_probe()).await;
                classify::from_outcome(service, spec, &outcome, DetectionMethod::TestRequestAudio)
            }
            Category::Video => {
                let outcome = self.attempt(target, &text_probe()).await;
                if self.assume_paid_video && outcome == ProbeOutcome::Unsupported {
                    classify::video_assumption(service, spec)
                } else {
                    classify::from_outcome(service, spec, &outcome, DetectionMethod::TestRequest)
                }
            }
            Category::Multimodal => {
                let outcome = self.attempt(target, &text_probe()).await;
                if outcome == ProbeOutcome::Unsupported {
                    classify::multimodal_fallback(service, spec)
                } else {
                    classify::from_outcome(service, spec, &outcome, DetectionMethod::TestRequest)
                }
            }
            Category::Text | Category::Reasoning | Category::Code | Category::General => {
                let outcome = self.attempt(target, &text_probe()).await;
                classify::from_outcome(service, spec, &outcome, DetectionMethod::TestRequest)
            }
        }
    }

    /// Sends `payload`, retrying timeouts and unclassified failures.
    async fn attempt(&self, target: ProbeTarget<'_>, payload: &ProbePayload) -> ProbeOutcome {
        let mut outcome = ProbeOutcome::Timeout;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                sleep(self.backoff * attempt).await;
            }
            outcome = timeout(self.attempt_timeout, self.transport.probe(target, payload))
                .await
                .unwrap_or(ProbeOutcome::Timeout);
            if !outcome.is_retryable() {
                return outcome;
            }
            debug!(
                "Probe attempt {} of {}:{} gave {outcome:?}",
                attempt + 1,
                target.service,
                target.model
            );
        }
        outcome
    }
}

/// Classifies models as free, paid or unknown and caches the results per user.
pub struct TierDetector {
    /// Network transport.
    transport: Arc<dyn ProbeTransport>,
    /// Per-user cache.
    cache: TierCache,
    /// Probe settings.
    config: DetectorConfig,
}

impl TierDetector {
    /// Detector over `transport`.
    pub fn new(transport: Arc<dyn ProbeTransport>, config: DetectorConfig) -> Self {
        Self {
            transport,
            cache: TierCache::new(config.cache_ttl()),
            config,
        }
    }

    /// Records for every requested model, keyed by `service:model`.
    ///
    /// When the cached entry already holds a known record for every requested
    /// provider it is returned without probing. Otherwise unknown records of
    /// uncovered providers are purged, covered providers are skipped, and the
    /// rest are probed and merged into the cache.
    pub async fn detect_all_models(
        &self,
        user_id: &str,
        payloads: &[ProviderPayload],
    ) -> HashMap<String, TierRecord> {
        let requested: Vec<&ProviderPayload> = payloads
            .iter()
            .filter(|payload| !payload.models.is_empty())
            .collect();
        let services: BTreeSet<&str> = requested
            .iter()
            .map(|payload| payload.service.as_str())
            .collect();

        if let Some(entry) = self.cache.get(user_id) {
            let uncovered: HashSet<String> = services
                .iter()
                .filter(|service| !entry.covers(service))
                .map(|service| (*service).to_owned())
                .collect();
            if uncovered.is_empty() {
                info!("Tier cache hit for {user_id} ({} providers)", services.len());
                return entry.records_for(services.iter().copied());
            }
            self.cache.purge_unknown(user_id, &uncovered);
        }

        let cached = self.cache.get(user_id);
        let mut fresh = Vec::new();
        for payload in requested {
            if cached
                .as_ref()
                .is_some_and(|entry| entry.covers(&payload.service))
            {
                debug!("Skipping {}: already covered for {user_id}", payload.service);
                continue;
            }
            fresh.extend(self.detect_provider(payload, cached.as_deref()).await);
        }

        info!("Detected {} tier records for {user_id}", fresh.len());
        self.cache
            .merge(user_id, fresh)
            .records_for(services.iter().copied())
    }

    /// Classifies a single model without consulting or updating the cache.
    pub async fn detect_model_tier(&self, service: &str, credential: &str, spec: &ModelSpec) -> TierRecord {
        if credential.trim().is_empty() {
            return classify::missing_credential(service, spec);
        }
        if !self.transport.supports(service) {
            return classify::unsupported_service(service, spec);
        }
        let pricing = if spec.name.ends_with(FREE_SUFFIX) {
            None
        } else {
            self.transport.declared_pricing(service, credential).await
        };
        self.prober(service)
            .detect(service, credential, spec, pricing.as_deref())
            .await
    }

    /// Cached records of `user_id`, if the entry has not expired.
    pub fn get_cached_tiers(&self, user_id: &str) -> Option<HashMap<String, TierRecord>> {
        self.cache.get(user_id).map(|entry| entry.records.clone())
    }

    /// Drops the cache entry of `user_id`, returning whether one existed.
    pub fn clear_cache(&self, user_id: &str) -> bool {
        let cleared = self.cache.clear(user_id);
        if cleared {
            info!("Tier cache cleared for {user_id}");
        }
        cleared
    }

    /// Drops every cache entry.
    pub fn clear_all(&self) {
        self.cache.clear_all();
    }

    /// Prober configured for `service`.
    fn prober(&self, service: &str) -> ModelProber {
        ModelProber {
            transport: Arc::clone(&self.transport),
            attempt_timeout: self.config.probe_timeout(service),
            max_retries: self.config.max_retries,
            backoff: Duration::from_millis(self.config.retry_backoff_ms),
            assume_paid_video: self.config.assumes_paid_video(service),
        }
    }

    /// Records for the models of one provider.
    async fn detect_provider(
        &self,
        payload: &ProviderPayload,
        cached: Option<&TierCacheEntry>,
    ) -> Vec<TierRecord> {
        let service = payload.service.as_str();
        if payload.credential.trim().is_empty() {
            warn!("No credential for {service}, skipping {} models", payload.models.len());
            return payload
                .models
                .iter()
                .map(|spec| classify::missing_credential(service, spec))
                .collect();
        }
        if !self.transport.supports(service) {
            warn!("Tier detection is not supported for {service}");
            return payload
                .models
                .iter()
                .map(|spec| classify::unsupported_service(service, spec))
                .collect();
        }

        let mut records = Vec::with_capacity(payload.models.len());
        let mut pending = Vec::new();
        for spec in &payload.models {
            match cached.and_then(|entry| entry.known_record(service, &spec.name)) {
                Some(record) => records.push(record.clone()),
                None => pending.push(spec.clone()),
            }
        }
        if pending.is_empty() {
            return records;
        }

        let pricing = if pending.iter().all(|spec| spec.name.ends_with(FREE_SUFFIX)) {
            None
        } else {
            self.transport
                .declared_pricing(service, &payload.credential)
                .await
        };

        info!("Probing {} {service} models", pending.len());
        let probed = if self.config.is_concurrent(service) {
            self.detect_concurrently(payload, pending, pricing).await
        } else {
            self.detect_sequentially(payload, &pending, pricing.as_deref()).await
        };
        records.extend(probed);
        records
    }

    /// Probes `pending` through a bounded task set, keeping input order.
    async fn detect_concurrently(
        &self,
        payload: &ProviderPayload,
        pending: Vec<ModelSpec>,
        pricing: Option<Vec<DeclaredPrice>>,
    ) -> Vec<TierRecord> {
        let prober = self.prober(&payload.service);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_probes.max(1)));
        let pricing: Option<Arc<[DeclaredPrice]>> = pricing.map(Arc::from);
        let mut join_set = JoinSet::new();

        for (index, spec) in pending.iter().cloned().enumerate() {
            let prober = prober.clone();
            let semaphore = Arc::clone(&semaphore);
            let pricing = pricing.clone();
            let service = payload.service.clone();
            let credential = payload.credential.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let record = prober
                    .detect(&service, &credential, &spec, pricing.as_deref())
                    .await;
                (index, record)
            });
        }

        let mut slots: Vec<Option<TierRecord>> = vec![None; pending.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, record)) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(record);
                    }
                }
                Err(err) => error!("Probe task for {} failed: {err}", payload.service),
            }
        }

        slots
            .into_iter()
            .zip(&pending)
            .map(|(slot, spec)| {
                slot.unwrap_or_else(|| {
                    classify::from_outcome(
                        &payload.service,
                        spec,
                        &ProbeOutcome::Failed("probe task aborted".to_owned()),
                        DetectionMethod::TestRequest,
                    )
                })
            })
            .collect()
    }

    /// Probes `pending` one at a time with a delay between calls.
    async fn detect_sequentially(
        &self,
        payload: &ProviderPayload,
        pending: &[ModelSpec],
        pricing: Option<&[DeclaredPrice]>,
    ) -> Vec<TierRecord> {
        let prober = self.prober(&payload.service);
        let delay = Duration::from_millis(self.config.sequential_delay_ms);
        let mut records = Vec::with_capacity(pending.len());

        for (index, spec) in pending.iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                sleep(delay).await;
            }
            records.push(
                prober
                    .detect(&payload.service, &payload.credential, spec, pricing)
                    .await,
            );
        }
        records
    }
}
