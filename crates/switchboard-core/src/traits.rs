use async_trait::async_trait;

use crate::probe::{DeclaredPrice, ProbeOutcome, ProbePayload, ProbeTarget};
use crate::provider_error::ProviderResult;
use crate::types::TokenUsage;

/// Uniform generate-text contract implemented once per upstream provider.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Provider key this adapter is registered under.
    fn name(&self) -> &str;

    /// Whether the adapter is configured well enough to be called.
    fn is_available(&self) -> bool;

    /// Generates text for a single user prompt.
    ///
    /// `model_name` overrides the adapter's default model and `max_tokens`
    /// its default completion budget.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientBalance` or `QuotaExceeded` for resilience-class
    /// upstream answers and `Llm` for everything else.
    async fn generate_text(
        &self,
        prompt: &str,
        max_tokens: Option<u32>,
        model_name: Option<&str>,
    ) -> ProviderResult<String>;
}

/// Sink for token accounting reported by adapters.
pub trait UsageRecorder: Send + Sync {
    /// Records the usage of one successful completion.
    fn record_usage(&self, service: &str, model: &str, usage: TokenUsage);
}

/// Network transport used by the tier detector.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    /// Whether the transport knows how to probe this provider.
    fn supports(&self, service: &str) -> bool;

    /// Sends one minimal request and classifies the answer.
    ///
    /// Implementations never fail: every failure is folded into the outcome.
    async fn probe(&self, target: ProbeTarget<'_>, payload: &ProbePayload) -> ProbeOutcome;

    /// Fetches the provider's declared pricing listing, if it publishes one.
    async fn declared_pricing(
        &self,
        _service: &str,
        _credential: &str,
    ) -> Option<Vec<DeclaredPrice>> {
        None
    }
}
