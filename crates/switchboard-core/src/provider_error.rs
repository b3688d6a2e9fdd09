//! Error contract every provider adapter raises.
//!
//! Adapters map upstream statuses onto three classes: two resilience-class
//! errors that the circuit breaker acts on, and a generic catch-all.

use core::result::Result as CoreResult;
use thiserror::Error;

use crate::types::FailureReason;

/// Result type returned by provider adapters.
pub type ProviderResult<T> = CoreResult<T, ProviderError>;

/// Failure raised by a provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The account has no balance left (HTTP 402).
    #[error("Insufficient balance on {provider} for {model}: {message}")]
    InsufficientBalance {
        /// Provider message.
        message: String,
        /// Provider key.
        provider: String,
        /// Model that was called.
        model: String,
    },

    /// A quota or rate limit was reached (HTTP 429).
    #[error("Quota exceeded on {provider} for {model}: {message}")]
    QuotaExceeded {
        /// Provider message.
        message: String,
        /// Provider key.
        provider: String,
        /// Model that was called.
        model: String,
    },

    /// Any other failure: unexpected statuses, transport errors, malformed payloads.
    #[error("{provider} error for {model}: {message}")]
    Llm {
        /// Provider message.
        message: String,
        /// Provider key.
        provider: String,
        /// Model that was called.
        model: String,
    },
}

impl ProviderError {
    /// Maps a non-success HTTP status onto the adapter error contract.
    pub fn from_status(status: u16, provider: &str, model: &str, detail: &str) -> Self {
        let provider = provider.to_owned();
        let model = model.to_owned();
        match status {
            402 => Self::InsufficientBalance {
                message: format!("insufficient balance ({detail})"),
                provider,
                model,
            },
            429 => Self::QuotaExceeded {
                message: format!("quota reached ({detail})"),
                provider,
                model,
            },
            other => Self::Llm {
                message: format!("status {other}: {detail}"),
                provider,
                model,
            },
        }
    }

    /// Builds a generic error.
    pub fn llm(provider: &str, model: &str, message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            provider: provider.to_owned(),
            model: model.to_owned(),
        }
    }

    /// Provider key the error came from.
    pub fn provider(&self) -> &str {
        match self {
            Self::InsufficientBalance { provider, .. }
            | Self::QuotaExceeded { provider, .. }
            | Self::Llm { provider, .. } => provider,
        }
    }

    /// Model the error came from.
    pub fn model(&self) -> &str {
        match self {
            Self::InsufficientBalance { model, .. }
            | Self::QuotaExceeded { model, .. }
            | Self::Llm { model, .. } => model,
        }
    }

    /// Whether this error signals a structural reason the call cannot succeed now.
    pub fn is_resilience(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance { .. } | Self::QuotaExceeded { .. }
        )
    }

    /// Circuit breaker reason for this error.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            Self::InsufficientBalance { .. } => FailureReason::InsufficientBalance,
            Self::QuotaExceeded { .. } => FailureReason::QuotaExceeded,
            Self::Llm { .. } => FailureReason::ProviderError,
        }
    }
}
