use std::result::Result as StdResult;
use switchboard_core::{Error as CoreError, ProviderError};
use thiserror::Error;

/// Result alias for routing operations.
pub type Result<T> = StdResult<T, RoutingError>;

/// Errors raised while selecting, executing or detecting.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Error from the core crate.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// The catalog returned no candidates.
    #[error("Catalog has no active candidates")]
    EmptyCatalog,

    /// Every candidate lacks a required capability.
    #[error("No model satisfies the required capabilities {required}")]
    NoCapableModel {
        /// Required capabilities, formatted as a list.
        required: String,
    },

    /// The catalog or preference source failed.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Every ranked candidate was tried and failed.
    #[error("All candidate models failed (attempted: {attempted:?}){}", cause_suffix(.last_cause.as_ref()))]
    AllCandidatesFailed {
        /// Candidate ids in the order they were tried.
        attempted: Vec<String>,
        /// Error of the last attempt.
        last_cause: Option<ProviderError>,
    },
}

/// Trailing description of the last adapter error, if any.
fn cause_suffix(cause: Option<&ProviderError>) -> String {
    cause.map_or_else(String::new, |error| format!(": {error}"))
}

impl RoutingError {
    /// Whether exhaustion was caused by a billing or quota condition.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            Self::AllCandidatesFailed {
                last_cause: Some(cause),
                ..
            } if cause.is_resilience()
        )
    }

    /// Whether the error comes from the request itself rather than provider health.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::EmptyCatalog | Self::NoCapableModel { .. } | Self::Core(_)
        )
    }

    /// HTTP status a gateway in front of the router should answer with.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NoCapableModel { .. } => 422,
            Self::AllCandidatesFailed { .. } if self.is_rate_limited() => 429,
            Self::AllCandidatesFailed { .. } | Self::EmptyCatalog => 503,
            Self::Core(_) | Self::Catalog(_) => 500,
        }
    }
}
