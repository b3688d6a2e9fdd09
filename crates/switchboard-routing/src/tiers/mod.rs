//! Commercial tier detection.
//!
//! Models are classified as free, paid or unknown by live probing or by a
//! provider's declared pricing. Results are cached per user and expire as a
//! whole.

/// Per-user tier cache.
pub mod cache;
/// Mapping from probe outcomes to tier records.
pub mod classify;
/// Probe orchestration.
pub mod detector;

pub use cache::{TierCache, TierCacheEntry};
pub use detector::TierDetector;

use serde::{Deserialize, Serialize};
use switchboard_core::Category;

/// A model to classify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model name as known to the provider.
    pub name: String,
    /// Category deciding which probe is sent.
    #[serde(default)]
    pub category: Category,
}

impl ModelSpec {
    /// Model `name` probed as `category`.
    pub fn new(name: impl Into<String>, category: Category) -> Self {
        Self {
            name: name.into(),
            category,
        }
    }
}

/// Models of one provider, with the credential used to probe them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPayload {
    /// Provider key.
    pub service: String,
    /// Credential for the provider.
    #[serde(default)]
    pub credential: String,
    /// Models to classify.
    #[serde(default)]
    pub models: Vec<ModelSpec>,
}

impl ProviderPayload {
    /// Payload for `service` authenticated with `credential`.
    pub fn new(service: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            credential: credential.into(),
            models: Vec::new(),
        }
    }

    /// Adds a model.
    #[must_use]
    pub fn with_model(mut self, name: impl Into<String>, category: Category) -> Self {
        self.models.push(ModelSpec::new(name, category));
        self
    }
}
