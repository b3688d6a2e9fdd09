//! HTTP transport for tier detection probes.
//!
//! Sends the smallest request each provider accepts and folds the answer into a
//! [`ProbeOutcome`]. The transport never raises: network failures, timeouts and
//! unexpected statuses all become outcomes the detector classifies.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::collections::HashMap;
use switchboard_core::{
    CostInfo, DeclaredPrice, ProbeOutcome, ProbePayload, ProbeTarget, ProbeTransport,
    ProviderConfig, QuotaInfo,
};

use crate::chat_completions::{GROQ, OPENROUTER, TOGETHER};
use crate::http::summarize_body;

/// Gemini API base URL.
const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Probe transport speaking to the real provider APIs.
pub struct HttpProbeTransport {
    /// HTTP client; per-attempt timeouts are enforced by the detector.
    client: Client,
    /// Base URL per provider key.
    base_urls: HashMap<String, String>,
}

impl Default for HttpProbeTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpProbeTransport {
    /// Transport with the public endpoints of every supported provider.
    pub fn new() -> Self {
        let base_urls = [
            (OPENROUTER.name, OPENROUTER.base_url),
            (GROQ.name, GROQ.base_url),
            (TOGETHER.name, TOGETHER.base_url),
            ("gemini", GEMINI_API_URL),
        ]
        .into_iter()
        .map(|(name, url)| (name.to_owned(), url.to_owned()))
        .collect();

        Self {
            client: Client::default(),
            base_urls,
        }
    }

    /// Transport using the base URL overrides of `config`.
    pub fn from_config(config: &ProviderConfig) -> Self {
        config
            .base_urls
            .iter()
            .fold(Self::new(), |transport, (service, base_url)| {
                transport.with_base_url(service, base_url.clone())
            })
    }

    /// Overrides the base URL of one provider.
    #[must_use]
    pub fn with_base_url(mut self, service: &str, base_url: impl Into<String>) -> Self {
        self.base_urls.insert(service.to_owned(), base_url.into());
        self
    }

    /// Base URL of a provider, without a trailing slash.
    fn base_url(&self, service: &str) -> Option<&str> {
        self.base_urls
            .get(service)
            .map(|url| url.trim_end_matches('/'))
    }

    /// `generateContent` request for Gemini.
    fn gemini_request(&self, base: &str, target: ProbeTarget<'_>, payload: &ProbePayload) -> RequestBuilder {
        let mut parts = vec![json!({ "text": payload.prompt() })];
        match payload {
            ProbePayload::Text { .. } => {}
            ProbePayload::Image { png_base64, .. } => parts.push(json!({
                "inline_data": { "mime_type": "image/png", "data": png_base64 }
            })),
            ProbePayload::Audio { wav_base64, .. } => parts.push(json!({
                "inline_data": { "mime_type": "audio/wav", "data": wav_base64 }
            })),
        }

        self.client
            .post(format!("{base}/models/{}:generateContent", target.model))
            .header("x-goog-api-key", target.credential)
            .json(&json!({
                "contents": [{ "parts": parts }],
                "generationConfig": { "maxOutputTokens": 1 }
            }))
    }

    /// Chat completions request for OpenAI-compatible providers.
    fn chat_request(&self, base: &str, target: ProbeTarget<'_>, payload: &ProbePayload) -> RequestBuilder {
        let content: JsonValue = match payload {
            ProbePayload::Text { prompt } => json!(prompt),
            ProbePayload::Image { prompt, png_base64 } => json!([
                { "type": "text", "text": prompt },
                {
                    "type": "image_url",
                    "image_url": { "url": format!("data:image/png;base64,{png_base64}") }
                }
            ]),
            ProbePayload::Audio { prompt, wav_base64 } => json!([
                { "type": "text", "text": prompt },
                {
                    "type": "input_audio",
                    "input_audio": { "data": wav_base64, "format": "wav" }
                }
            ]),
        };

        self.client
            .post(format!("{base}/chat/completions"))
            .bearer_auth(target.credential)
            .json(&json!({
                "model": target.model,
                "messages": [{ "role": "user", "content": content }],
                "max_tokens": 1
            }))
    }
}

/// Reads the rate-limit headers providers attach to successful responses.
pub fn parse_quota_headers(headers: &HeaderMap) -> Option<QuotaInfo> {
    let text = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_owned())
    };
    let number = |name: &str| text(name).and_then(|value| value.parse::<u64>().ok());

    let quota = QuotaInfo {
        limit_requests: number("x-ratelimit-limit-requests").or_else(|| number("x-ratelimit-limit")),
        remaining_requests: number("x-ratelimit-remaining-requests")
            .or_else(|| number("x-ratelimit-remaining")),
        limit_tokens: number("x-ratelimit-limit-tokens"),
        remaining_tokens: number("x-ratelimit-remaining-tokens"),
        reset_requests: text("x-ratelimit-reset-requests").or_else(|| text("x-ratelimit-reset")),
        reset_tokens: text("x-ratelimit-reset-tokens"),
    };

    (!quota.is_empty()).then_some(quota)
}

/// Maps a provider response onto a probe outcome.
async fn classify_response(response: Response) -> ProbeOutcome {
    let status = response.status();
    if status.is_success() {
        return ProbeOutcome::Success {
            quota: parse_quota_headers(response.headers()),
        };
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ProbeOutcome::QuotaExhausted;
    }
    if status == StatusCode::PAYMENT_REQUIRED {
        return ProbeOutcome::PaymentRequired;
    }

    let body = response.text().await.unwrap_or_default();
    let lowered = body.to_lowercase();
    if lowered.contains("billing") || lowered.contains("payment") {
        ProbeOutcome::PaymentRequired
    } else if lowered.contains("resource_exhausted") || lowered.contains("quota") {
        ProbeOutcome::QuotaExhausted
    } else if status == StatusCode::NOT_FOUND
        || lowered.contains("not found")
        || lowered.contains("not supported")
        || lowered.contains("unsupported")
    {
        ProbeOutcome::Unsupported
    } else {
        ProbeOutcome::Failed(format!("status {status}: {}", summarize_body(&body)))
    }
}

/// Pricing listing returned by `GET /models`.
#[derive(Debug, Deserialize)]
struct ModelListing {
    /// Listed models.
    #[serde(default)]
    data: Vec<ListedModel>,
}

/// One listed model.
#[derive(Debug, Deserialize)]
struct ListedModel {
    /// Model id.
    id: String,
    /// Declared prices, as decimal strings.
    #[serde(default)]
    pricing: Option<ListedPricing>,
}

/// Declared prices of a listed model.
#[derive(Debug, Deserialize)]
struct ListedPricing {
    /// Prompt price per token.
    #[serde(default)]
    prompt: Option<JsonValue>,
    /// Completion price per token.
    #[serde(default)]
    completion: Option<JsonValue>,
}

/// Parses a price that may be a JSON string or number; missing means zero.
fn parse_price(value: Option<&JsonValue>) -> Option<f64> {
    match value {
        None | Some(JsonValue::Null) => Some(0.0),
        Some(JsonValue::Number(number)) => number.as_f64(),
        Some(JsonValue::String(text)) if text.trim().is_empty() => Some(0.0),
        Some(JsonValue::String(text)) => text.trim().parse().ok(),
        Some(_) => None,
    }
}

impl ListedModel {
    /// Converts to a declared price, skipping unparseable listings.
    fn into_declared(self) -> Option<DeclaredPrice> {
        let pricing = self.pricing?;
        let prompt = parse_price(pricing.prompt.as_ref())?;
        let completion = parse_price(pricing.completion.as_ref())?;
        Some(DeclaredPrice {
            model: self.id,
            cost: CostInfo { prompt, completion },
        })
    }
}

#[async_trait]
impl ProbeTransport for HttpProbeTransport {
    fn supports(&self, service: &str) -> bool {
        self.base_urls.contains_key(service)
    }

    async fn probe(&self, target: ProbeTarget<'_>, payload: &ProbePayload) -> ProbeOutcome {
        let Some(base) = self.base_url(target.service) else {
            return ProbeOutcome::Failed(format!("no endpoint for {}", target.service));
        };

        let request = if target.service == "gemini" {
            self.gemini_request(base, target, payload)
        } else {
            self.chat_request(base, target, payload)
        };

        match request.send().await {
            Ok(response) => classify_response(response).await,
            Err(err) if err.is_timeout() => ProbeOutcome::Timeout,
            Err(err) => ProbeOutcome::Failed(err.to_string()),
        }
    }

    async fn declared_pricing(&self, service: &str, credential: &str) -> Option<Vec<DeclaredPrice>> {
        if service != OPENROUTER.name {
            return None;
        }
        let base = self.base_url(service)?;

        let response = match self
            .client
            .get(format!("{base}/models"))
            .bearer_auth(credential)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::warn!("Pricing listing for {service} returned {}", response.status());
                return None;
            }
            Err(err) => {
                tracing::warn!("Pricing listing for {service} failed: {err}");
                return None;
            }
        };

        match response.json::<ModelListing>().await {
            Ok(listing) => Some(
                listing
                    .data
                    .into_iter()
                    .filter_map(ListedModel::into_declared)
                    .collect(),
            ),
            Err(err) => {
                tracing::warn!("Pricing listing for {service} could not be parsed: {err}");
                None
            }
        }
    }
}
