use serde::{Deserialize, Serialize};

use crate::types::{CostInfo, QuotaInfo};

/// Which model a probe is sent to.
#[derive(Debug, Clone, Copy)]
pub struct ProbeTarget<'req> {
    /// Provider key.
    pub service: &'req str,
    /// Credential for the provider.
    pub credential: &'req str,
    /// Model name as known to the provider.
    pub model: &'req str,
}

/// Minimal request body sent to classify a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbePayload {
    /// Short text prompt.
    Text {
        /// Prompt text.
        prompt: String,
    },
    /// Prompt with a 1x1 PNG attached.
    Image {
        /// Prompt text.
        prompt: String,
        /// Base64 encoded PNG.
        png_base64: String,
    },
    /// Prompt with a short silent WAV clip attached.
    Audio {
        /// Prompt text.
        prompt: String,
        /// Base64 encoded WAV.
        wav_base64: String,
    },
}

impl ProbePayload {
    /// Text payload with the given prompt.
    pub fn text(prompt: impl Into<String>) -> Self {
        Self::Text {
            prompt: prompt.into(),
        }
    }

    /// Prompt text of any payload kind.
    pub fn prompt(&self) -> &str {
        match self {
            Self::Text { prompt } | Self::Image { prompt, .. } | Self::Audio { prompt, .. } => {
                prompt
            }
        }
    }
}

/// Classified result of a single probe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The provider answered.
    Success {
        /// Rate-limit headers, if any were present.
        quota: Option<QuotaInfo>,
    },
    /// Quota or rate limit reached.
    QuotaExhausted,
    /// Billing or payment required.
    PaymentRequired,
    /// Model not found or operation not supported.
    Unsupported,
    /// The attempt timed out.
    Timeout,
    /// Any other failure.
    Failed(String),
}

impl ProbeOutcome {
    /// Whether another attempt might produce a different answer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Failed(_))
    }
}

/// One entry of a provider's declared pricing listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredPrice {
    /// Model name as listed.
    pub model: String,
    /// Listed prices.
    pub cost: CostInfo,
}
