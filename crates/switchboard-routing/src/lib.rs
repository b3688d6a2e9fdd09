//! Model selection, fallback execution and tier detection.
//!
//! The selector ranks catalog candidates and skips models whose circuit is
//! open; the executor walks the ranking until one adapter answers and feeds
//! billing and quota failures back into the shared breaker. The tier detector
//! runs independently and only fills a per-user cache.

/// Breaker-backed availability filter.
pub mod availability;
/// Per-model circuit breaker.
pub mod breaker;
/// Capability filtering.
pub mod capability;
/// Catalog and preference sources.
pub mod catalog;
/// Routing error types.
pub mod error;
/// Fallback execution loop.
pub mod execution;
/// Facade wiring every component together.
pub mod orchestrator;
/// Provider registry.
pub mod registry;
/// Model selector.
pub mod selector;
/// Ranking strategies.
pub mod strategies;
/// Tier detection and caching.
pub mod tiers;
/// Token usage ledger.
pub mod usage;

pub use availability::AvailabilityService;
pub use breaker::{CircuitBreaker, CircuitEntry, CircuitState};
pub use capability::{describe_capabilities, filter_by_capabilities};
pub use catalog::{
    CatalogSource, InMemoryPreferences, PreferenceSource, StaticCatalog, UserPreferences,
};
pub use error::{Result, RoutingError};
pub use execution::{
    ConversationModels, ExecutionOutcome, ExecutionRequest, InMemoryConversationModels,
    RequestExecutor,
};
pub use orchestrator::Switchboard;
pub use registry::ProviderRegistry;
pub use selector::{
    ALL_DOWN_NOTICE, FREE_UNAVAILABLE_NOTICE, INSUFFICIENT_BALANCE_NOTICE, ModelSelector,
    NOTICE_INSPECTION_DEPTH, QUOTA_EXCEEDED_NOTICE, SelectedModel, SelectionRequest,
    SelectionResult, resolve_provider,
};
pub use strategies::{CostModel, KeywordCostModel, RankingStrategies, Strategy};
pub use tiers::{ModelSpec, ProviderPayload, TierCache, TierCacheEntry, TierDetector};
pub use usage::{UsageLedger, UsageTotals};
