//! Probe outcome classification.
//!
//! | outcome              | tier    | confidence | available |
//! |----------------------|---------|------------|-----------|
//! | success              | free    | 0.7 / 0.9  | yes       |
//! | quota exhausted      | free    | 0.8        | yes       |
//! | payment required     | paid    | 0.9        | no        |
//! | unsupported          | unknown | 0.5        | no        |
//! | timeout / failure    | unknown | 0.0        | no        |
//!
//! A success whose rate-limit headers report a small request window is a
//! free tier with higher confidence.

use switchboard_core::{DeclaredPrice, DetectionMethod, ProbeOutcome, Tier, TierRecord};

use super::ModelSpec;

/// Request windows below this limit are characteristic of free tiers.
pub const FREE_TIER_REQUEST_LIMIT: u64 = 20_000;
/// Suffix marking free variants in a model name.
pub const FREE_SUFFIX: &str = ":free";

/// Record for `spec` on `service`.
fn record(service: &str, spec: &ModelSpec, tier: Tier, method: DetectionMethod) -> TierRecord {
    TierRecord::new(service, &spec.name, spec.category, tier, method)
}

/// Classifies one probe outcome; `success_method` names the probe that was sent.
pub fn from_outcome(
    service: &str,
    spec: &ModelSpec,
    outcome: &ProbeOutcome,
    success_method: DetectionMethod,
) -> TierRecord {
    match outcome {
        ProbeOutcome::Success { quota } => {
            let small_window = quota
                .as_ref()
                .and_then(|quota| quota.limit_requests)
                .is_some_and(|limit| limit < FREE_TIER_REQUEST_LIMIT);
            let mut result = if small_window {
                record(service, spec, Tier::Free, DetectionMethod::RateLimitHeaders)
                    .with_confidence(0.9)
            } else {
                record(service, spec, Tier::Free, success_method).with_confidence(0.7)
            };
            result.quota_info.clone_from(quota);
            result
        }
        ProbeOutcome::QuotaExhausted => {
            record(service, spec, Tier::Free, DetectionMethod::ErrorQuotaExceeded).with_confidence(0.8)
        }
        ProbeOutcome::PaymentRequired => {
            record(service, spec, Tier::Paid, DetectionMethod::ErrorPaymentRequired)
                .with_confidence(0.9)
                .with_available(false)
        }
        ProbeOutcome::Unsupported => {
            record(service, spec, Tier::Unknown, DetectionMethod::ErrorNotSupported)
                .with_confidence(0.5)
                .with_available(false)
        }
        ProbeOutcome::Timeout => {
            record(service, spec, Tier::Unknown, DetectionMethod::Timeout).with_available(false)
        }
        ProbeOutcome::Failed(message) => {
            tracing::debug!("Probe of {service}:{} failed: {message}", spec.name);
            record(service, spec, Tier::Unknown, DetectionMethod::Error).with_available(false)
        }
    }
}

/// Classifies the text probe sent after an image probe was rejected.
pub fn from_text_fallback(service: &str, spec: &ModelSpec, outcome: &ProbeOutcome) -> TierRecord {
    match outcome {
        ProbeOutcome::Success { quota } => {
            let mut result =
                record(service, spec, Tier::Free, DetectionMethod::TestRequestTextFallback)
                    .with_confidence(0.6);
            result.quota_info.clone_from(quota);
            result
        }
        other => from_outcome(service, spec, other, DetectionMethod::TestRequest),
    }
}

/// Free record for names carrying the free suffix.
pub fn from_free_suffix(service: &str, spec: &ModelSpec) -> Option<TierRecord> {
    spec.name.ends_with(FREE_SUFFIX).then(|| {
        record(service, spec, Tier::Free, DetectionMethod::FreeSuffix).with_confidence(0.95)
    })
}

/// Record derived from a declared price.
pub fn from_declared_price(service: &str, spec: &ModelSpec, price: &DeclaredPrice) -> TierRecord {
    let tier = if price.cost.is_free() {
        Tier::Free
    } else {
        Tier::Paid
    };
    record(service, spec, tier, DetectionMethod::PricingEndpoint)
        .with_confidence(0.9)
        .with_cost(price.cost)
}

/// Video generation models cannot be probed with text; assume they are paid.
pub fn video_assumption(service: &str, spec: &ModelSpec) -> TierRecord {
    record(service, spec, Tier::Paid, DetectionMethod::VideoGenerationAssumption).with_confidence(0.7)
}

/// Multimodal model that rejected a text probe.
pub fn multimodal_fallback(service: &str, spec: &ModelSpec) -> TierRecord {
    record(service, spec, Tier::Unknown, DetectionMethod::MultimodalFallback)
        .with_confidence(0.5)
        .with_available(false)
}

/// Record for a provider payload without a credential.
pub fn missing_credential(service: &str, spec: &ModelSpec) -> TierRecord {
    record(service, spec, Tier::Unknown, DetectionMethod::MissingCredential).with_available(false)
}

/// Record for a provider the transport cannot probe.
pub fn unsupported_service(service: &str, spec: &ModelSpec) -> TierRecord {
    record(service, spec, Tier::Unknown, DetectionMethod::UnsupportedService).with_available(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::{Category, CostInfo, QuotaInfo};

    fn spec(name: &str) -> ModelSpec {
        ModelSpec::new(name, Category::Text)
    }

    fn success(limit: Option<u64>) -> ProbeOutcome {
        ProbeOutcome::Success {
            quota: limit.map(|limit| QuotaInfo {
                limit_requests: Some(limit),
                ..QuotaInfo::default()
            }),
        }
    }

    #[test]
    fn test_success_is_free() {
        let plain = from_outcome("groq", &spec("m"), &success(None), DetectionMethod::TestRequest);
        assert_eq!(plain.tier, Tier::Free);
        assert_eq!(plain.detection_method, DetectionMethod::TestRequest);
        assert!((plain.confidence - 0.7).abs() < f64::EPSILON);
        assert!(plain.available);
    }

    #[test]
    fn test_rate_limit_headers_raise_confidence() {
        let small = from_outcome("groq", &spec("m"), &success(Some(14_400)), DetectionMethod::TestRequest);
        assert_eq!(small.detection_method, DetectionMethod::RateLimitHeaders);
        assert!((small.confidence - 0.9).abs() < f64::EPSILON);
        assert!(small.quota_info.is_some());

        let large = from_outcome("groq", &spec("m"), &success(Some(20_000)), DetectionMethod::TestRequest);
        assert_eq!(large.detection_method, DetectionMethod::TestRequest);
        assert!((large.confidence - 0.7).abs() < f64::EPSILON);
        assert_eq!(large.tier, Tier::Free);
    }

    #[test]
    fn test_error_outcomes() {
        let quota = from_outcome("gemini", &spec("m"), &ProbeOutcome::QuotaExhausted, DetectionMethod::TestRequest);
        assert_eq!((quota.tier, quota.available), (Tier::Free, true));
        assert!((quota.confidence - 0.8).abs() < f64::EPSILON);

        let paid = from_outcome("gemini", &spec("m"), &ProbeOutcome::PaymentRequired, DetectionMethod::TestRequest);
        assert_eq!((paid.tier, paid.available), (Tier::Paid, false));

        let unsupported = from_outcome("gemini", &spec("m"), &ProbeOutcome::Unsupported, DetectionMethod::TestRequest);
        assert_eq!(unsupported.tier, Tier::Unknown);
        assert_eq!(unsupported.detection_method, DetectionMethod::ErrorNotSupported);

        let failed = from_outcome(
            "gemini",
            &spec("m"),
            &ProbeOutcome::Failed("reset".to_owned()),
            DetectionMethod::TestRequest,
        );
        assert_eq!(failed.tier, Tier::Unknown);
        assert!(failed.confidence.abs() < f64::EPSILON);
        assert!(!failed.available);
    }

    #[test]
    fn test_free_suffix_and_declared_price() {
        let suffixed = from_free_suffix("openrouter", &spec("meta/llama-3:free")).expect("free suffix");
        assert_eq!(suffixed.detection_method, DetectionMethod::FreeSuffix);
        assert!(from_free_suffix("openrouter", &spec("meta/llama-3")).is_none());

        let priced = DeclaredPrice {
            model: "openai/gpt-4o".to_owned(),
            cost: CostInfo {
                prompt: 0.000_002_5,
                completion: 0.000_01,
            },
        };
        let paid = from_declared_price("openrouter", &spec("openai/gpt-4o"), &priced);
        assert_eq!(paid.tier, Tier::Paid);
        assert_eq!(paid.cost_info, Some(priced.cost));
    }

    #[test]
    fn test_text_fallback() {
        let fallback = from_text_fallback("gemini", &spec("m"), &success(None));
        assert_eq!(fallback.detection_method, DetectionMethod::TestRequestTextFallback);
        assert!((fallback.confidence - 0.6).abs() < f64::EPSILON);

        let paid = from_text_fallback("gemini", &spec("m"), &ProbeOutcome::PaymentRequired);
        assert_eq!(paid.tier, Tier::Paid);
    }
}
