use chrono::{DateTime, Utc};
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Input modality or feature a model must support to serve a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Accepts text input.
    #[serde(alias = "text")]
    TextInput,
    /// Accepts image input.
    #[serde(alias = "image")]
    ImageInput,
    /// Accepts audio input.
    #[serde(alias = "audio")]
    AudioInput,
    /// Accepts video input.
    #[serde(alias = "video")]
    VideoInput,
    /// Supports tool or function calling.
    FunctionCalling,
    /// Supports constrained JSON output.
    JsonMode,
}

impl Capability {
    /// Stable snake case name used in logs and configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextInput => "text_input",
            Self::ImageInput => "image_input",
            Self::AudioInput => "audio_input",
            Self::VideoInput => "video_input",
            Self::FunctionCalling => "function_calling",
            Self::JsonMode => "json_mode",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "text" | "text_input" => Ok(Self::TextInput),
            "image" | "image_input" => Ok(Self::ImageInput),
            "audio" | "audio_input" => Ok(Self::AudioInput),
            "video" | "video_input" => Ok(Self::VideoInput),
            "function_calling" | "tools" => Ok(Self::FunctionCalling),
            "json_mode" | "json" => Ok(Self::JsonMode),
            other => Err(format!("unknown capability: {other}")),
        }
    }
}

/// Functional category of a model or of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Plain text generation.
    Text,
    /// Multi-step reasoning.
    Reasoning,
    /// Code generation.
    Code,
    /// Image generation or understanding.
    Image,
    /// Vision (image input) models.
    Vision,
    /// Speech and audio models.
    Audio,
    /// Video generation models.
    Video,
    /// Models mixing several modalities.
    Multimodal,
    /// Anything the catalog does not classify further.
    #[default]
    #[serde(other)]
    General,
}

impl Category {
    /// Lowercase name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Reasoning => "reasoning",
            Self::Code => "code",
            Self::Image => "image",
            Self::Vision => "vision",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Multimodal => "multimodal",
            Self::General => "general",
        }
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "text" => Self::Text,
            "reasoning" => Self::Reasoning,
            "code" => Self::Code,
            "image" => Self::Image,
            "vision" => Self::Vision,
            "audio" => Self::Audio,
            "video" => Self::Video,
            "multimodal" => Self::Multimodal,
            _ => Self::General,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Read-only catalog entry describing a selectable model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Stable catalog identifier, also the circuit breaker key.
    pub id: String,
    /// Human readable name.
    #[serde(default)]
    pub display_name: String,
    /// Capabilities the model supports.
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
    /// Quality score (ELO-like), if the catalog knows one.
    #[serde(default)]
    pub score: Option<f64>,
    /// Category the catalog assigns to the model.
    #[serde(default)]
    pub category: Category,
    /// Organization that trains the model.
    #[serde(default)]
    pub organization: Option<String>,
    /// Upstream source the catalog entry was synced from.
    #[serde(default)]
    pub source: Option<String>,
    /// Explicit provider key, overriding source-based resolution.
    #[serde(default)]
    pub provider: Option<String>,
    /// Model name to send upstream when it differs from `id`.
    #[serde(default)]
    pub api_model: Option<String>,
}

impl Candidate {
    /// Creates a candidate with the given id and no metadata.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            capabilities: BTreeSet::new(),
            score: None,
            category: Category::General,
            organization: None,
            source: None,
            provider: None,
            api_model: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Sets the capability set.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities = capabilities.into_iter().collect();
        self
    }

    /// Sets the quality score.
    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Sets the category.
    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Sets the upstream source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the explicit provider key.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the upstream model name.
    #[must_use]
    pub fn with_api_model(mut self, model: impl Into<String>) -> Self {
        self.api_model = Some(model.into());
        self
    }

    /// Model name to send to the provider.
    pub fn upstream_model(&self) -> &str {
        self.api_model.as_deref().unwrap_or(&self.id)
    }

    /// Lowercased id and display name, used by keyword heuristics.
    pub fn search_name(&self) -> String {
        format!("{} {}", self.id, self.display_name).to_lowercase()
    }

    /// Lowercased source, or an empty string.
    pub fn source_lower(&self) -> String {
        self.source.as_deref().unwrap_or_default().to_lowercase()
    }

    /// Whether every required capability is supported.
    pub fn supports_all(&self, required: &BTreeSet<Capability>) -> bool {
        required.is_subset(&self.capabilities)
    }
}

/// Why a provider call failed, as recorded by the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Provider reported no remaining balance.
    InsufficientBalance,
    /// Provider rejected the call because a quota or rate limit was reached.
    QuotaExceeded,
    /// Generic provider failure.
    ProviderError,
    /// No reason supplied.
    #[serde(other)]
    UnknownError,
}

impl FailureReason {
    /// Stable snake case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsufficientBalance => "insufficient_balance",
            Self::QuotaExceeded => "quota_exceeded",
            Self::ProviderError => "provider_error",
            Self::UnknownError => "unknown_error",
        }
    }

    /// Resilience-class reasons open a circuit on their first occurrence.
    pub fn opens_immediately(self) -> bool {
        matches!(self, Self::InsufficientBalance | Self::QuotaExceeded)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Token accounting for a single completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input: u64,
    /// Completion tokens.
    pub output: u64,
}

impl TokenUsage {
    /// Sum of input and output tokens.
    pub fn total(&self) -> u64 {
        self.input + self.output
    }
}

/// Commercial classification of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Usable without payment.
    Free,
    /// Requires payment.
    Paid,
    /// Could not be determined. Never treated as free.
    Unknown,
}

impl Tier {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Paid => "paid",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// How a tier classification was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// A minimal text request succeeded.
    TestRequest,
    /// A minimal image request succeeded.
    TestRequestImage,
    /// A minimal audio request succeeded.
    TestRequestAudio,
    /// The image probe failed but a text probe succeeded.
    TestRequestTextFallback,
    /// Success with a small request limit reported in rate-limit headers.
    RateLimitHeaders,
    /// The provider answered with a quota or rate-limit error.
    ErrorQuotaExceeded,
    /// The provider answered with a billing or payment-required error.
    ErrorPaymentRequired,
    /// The model does not support the probed operation.
    ErrorNotSupported,
    /// Video-generation models that cannot be probed directly.
    VideoGenerationAssumption,
    /// Multimodal model whose text probe was rejected.
    MultimodalFallback,
    /// Declared pricing listing.
    PricingEndpoint,
    /// Model name carries the provider's free suffix.
    FreeSuffix,
    /// Every attempt timed out.
    Timeout,
    /// Every attempt failed for another reason.
    Error,
    /// No credential was supplied for the provider.
    MissingCredential,
    /// The transport has no probe for the provider.
    UnsupportedService,
}

impl DetectionMethod {
    /// Stable snake case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TestRequest => "test_request",
            Self::TestRequestImage => "test_request_image",
            Self::TestRequestAudio => "test_request_audio",
            Self::TestRequestTextFallback => "test_request_text_fallback",
            Self::RateLimitHeaders => "rate_limit_headers",
            Self::ErrorQuotaExceeded => "error_quota_exceeded",
            Self::ErrorPaymentRequired => "error_payment_required",
            Self::ErrorNotSupported => "error_not_supported",
            Self::VideoGenerationAssumption => "video_generation_assumption",
            Self::MultimodalFallback => "multimodal_fallback",
            Self::PricingEndpoint => "pricing_endpoint",
            Self::FreeSuffix => "free_suffix",
            Self::Timeout => "timeout",
            Self::Error => "error",
            Self::MissingCredential => "missing_credential",
            Self::UnsupportedService => "unsupported_service",
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Rate-limit metadata read from provider response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaInfo {
    /// Request limit for the current window.
    pub limit_requests: Option<u64>,
    /// Requests left in the current window.
    pub remaining_requests: Option<u64>,
    /// Token limit for the current window.
    pub limit_tokens: Option<u64>,
    /// Tokens left in the current window.
    pub remaining_tokens: Option<u64>,
    /// When the request window resets, as reported.
    pub reset_requests: Option<String>,
    /// When the token window resets, as reported.
    pub reset_tokens: Option<String>,
}

impl QuotaInfo {
    /// Whether no header was present.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Declared per-token prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostInfo {
    /// Price per prompt token in USD.
    pub prompt: f64,
    /// Price per completion token in USD.
    pub completion: f64,
}

impl CostInfo {
    /// Whether both prices are zero.
    pub fn is_free(&self) -> bool {
        self.prompt.abs() < f64::EPSILON && self.completion.abs() < f64::EPSILON
    }
}

/// Tier classification of one (provider, model) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierRecord {
    /// Model name as known to the provider.
    pub model_name: String,
    /// Provider key.
    pub service: String,
    /// Category the model was probed as.
    pub category: Category,
    /// Classification.
    pub tier: Tier,
    /// How the classification was obtained.
    pub detection_method: DetectionMethod,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Whether the model answered the probe.
    pub available: bool,
    /// Rate-limit metadata, when reported.
    pub quota_info: Option<QuotaInfo>,
    /// Declared pricing, when listed.
    pub cost_info: Option<CostInfo>,
    /// When the record was produced.
    pub last_checked: DateTime<Utc>,
}

impl TierRecord {
    /// Creates an available record with zero confidence.
    pub fn new(
        service: &str,
        model_name: &str,
        category: Category,
        tier: Tier,
        detection_method: DetectionMethod,
    ) -> Self {
        Self {
            model_name: model_name.to_owned(),
            service: service.to_owned(),
            category,
            tier,
            detection_method,
            confidence: 0.0,
            available: true,
            quota_info: None,
            cost_info: None,
            last_checked: Utc::now(),
        }
    }

    /// Sets the confidence, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Sets the availability flag.
    #[must_use]
    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Attaches rate-limit metadata.
    #[must_use]
    pub fn with_quota(mut self, quota: QuotaInfo) -> Self {
        self.quota_info = Some(quota);
        self
    }

    /// Attaches declared pricing.
    #[must_use]
    pub fn with_cost(mut self, cost: CostInfo) -> Self {
        self.cost_info = Some(cost);
        self
    }

    /// Cache key of a (service, model) pair.
    pub fn model_key(service: &str, model_name: &str) -> String {
        format!("{service}:{model_name}")
    }

    /// Cache key of this record.
    pub fn key(&self) -> String {
        Self::model_key(&self.service, &self.model_name)
    }

    /// Whether the tier is free or paid.
    pub fn is_known(&self) -> bool {
        self.tier != Tier::Unknown
    }
}
