use std::sync::Arc;
use switchboard_core::{ProbeTransport, SwitchboardConfig, UsageRecorder};
use switchboard_providers::HttpProbeTransport;

use crate::breaker::CircuitBreaker;
use crate::catalog::{CatalogSource, PreferenceSource};
use crate::execution::{ConversationModels, ExecutionOutcome, ExecutionRequest, RequestExecutor};
use crate::registry::ProviderRegistry;
use crate::selector::{ModelSelector, SelectionRequest, SelectionResult};
use crate::tiers::TierDetector;
use crate::usage::UsageLedger;
use crate::Result;

/// High-level entry point wiring selection, execution and tier detection
/// around one shared circuit breaker.
pub struct Switchboard {
    /// Breaker shared by the selector and the executor.
    breaker: Arc<CircuitBreaker>,
    /// Model selector.
    selector: ModelSelector,
    /// Fallback execution loop.
    executor: RequestExecutor,
    /// Tier detector.
    detector: TierDetector,
    /// Token accounting fed by every adapter.
    usage: Arc<UsageLedger>,
}

impl Switchboard {
    /// Builds every component from `config`, serving candidates from `catalog`.
    ///
    /// Adapters are registered for each provider with an API key and tier
    /// probes go over HTTP.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or an adapter cannot be built.
    pub fn from_config(config: &SwitchboardConfig, catalog: Arc<dyn CatalogSource>) -> Result<Self> {
        config.validate()?;
        let usage = Arc::new(UsageLedger::new());
        let recorder = Arc::clone(&usage) as Arc<dyn UsageRecorder>;
        let registry = ProviderRegistry::from_config(config, Some(&recorder))?;
        Ok(Self::with_parts(
            config,
            catalog,
            registry,
            Arc::new(HttpProbeTransport::from_config(&config.providers)),
            usage,
        ))
    }

    /// Builds the components around explicit adapters and probe transport.
    pub fn with_parts(
        config: &SwitchboardConfig,
        catalog: Arc<dyn CatalogSource>,
        registry: ProviderRegistry,
        transport: Arc<dyn ProbeTransport>,
        usage: Arc<UsageLedger>,
    ) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(&config.breaker));
        let selector =
            ModelSelector::new(catalog, Arc::clone(&breaker)).with_config(&config.selector);
        let executor = RequestExecutor::new(Arc::new(registry), Arc::clone(&breaker))
            .with_config(&config.execution);
        let detector = TierDetector::new(transport, config.detector.clone());

        tracing::debug!("Switchboard initialized");
        Self {
            breaker,
            selector,
            executor,
            detector,
            usage,
        }
    }

    /// Reads user preferences from `preferences`.
    #[must_use]
    pub fn with_preferences(mut self, preferences: Arc<dyn PreferenceSource>) -> Self {
        self.selector = self.selector.with_preferences(preferences);
        self
    }

    /// Tracks which model serves each conversation.
    #[must_use]
    pub fn with_conversations(mut self, conversations: Arc<dyn ConversationModels>) -> Self {
        self.executor = self.executor.with_conversations(conversations);
        self
    }

    /// Selects a model for `request`.
    ///
    /// # Errors
    /// Returns an error if the catalog is empty or no model is capable.
    pub async fn select(&self, request: &SelectionRequest) -> Result<SelectionResult> {
        self.selector.select_model(request).await
    }

    /// Selects a model and runs `execution` against it with fallback.
    ///
    /// # Errors
    /// Returns selection errors, or `AllCandidatesFailed` when every candidate failed.
    pub async fn generate(
        &self,
        request: &SelectionRequest,
        execution: &ExecutionRequest,
    ) -> Result<ExecutionOutcome> {
        let selection = self.select(request).await?;
        self.executor.execute(&selection, execution).await
    }

    /// Shared circuit breaker.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Tier detector.
    pub fn detector(&self) -> &TierDetector {
        &self.detector
    }

    /// Token usage ledger.
    pub fn usage(&self) -> &UsageLedger {
        &self.usage
    }
}
