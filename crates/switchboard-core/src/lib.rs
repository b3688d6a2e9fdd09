//! Core types and traits for the switchboard model router.
//!
//! This crate provides the shared data model, error taxonomy, collaborator
//! traits and configuration used by the provider adapters and the routing layer.

/// Configuration loaded from `~/.switchboard/config.toml`.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Probe request and outcome types used by tier detection.
pub mod probe;
/// Error contract shared by every provider adapter.
pub mod provider_error;
/// Lock helpers that ignore poisoning.
pub mod sync;
/// Trait definitions for providers, probe transports and usage recorders.
pub mod traits;
/// Core data types for candidates, capabilities and tier records.
pub mod types;

pub use config::{
    ApiKeys, BreakerConfig, DetectorConfig, ExecutionConfig, ProviderConfig, SelectorConfig,
    SwitchboardConfig, TransientFailurePolicy,
};
pub use error::{Error, Result};
pub use probe::{DeclaredPrice, ProbeOutcome, ProbePayload, ProbeTarget};
pub use provider_error::{ProviderError, ProviderResult};
pub use sync::{IgnoreLock, IgnoreRwLock};
pub use traits::{ProbeTransport, TextProvider, UsageRecorder};
pub use types::{
    Candidate, Capability, Category, CostInfo, DetectionMethod, FailureReason, QuotaInfo, Tier,
    TierRecord, TokenUsage,
};
