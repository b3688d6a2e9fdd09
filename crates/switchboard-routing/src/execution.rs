//! Request execution with ordered fallback.
//!
//! The executor walks the selected model and then each alternative. Billing
//! and quota failures open the model's circuit immediately and produce a user
//! facing notice; other failures are logged and, depending on the configured
//! policy, counted against the circuit.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use switchboard_core::{
    ExecutionConfig, FailureReason, IgnoreLock as _, ProviderError, TransientFailurePolicy,
};
use tracing::{debug, info, warn};

use crate::breaker::CircuitBreaker;
use crate::registry::ProviderRegistry;
use crate::selector::{SelectedModel, SelectionResult};
use crate::{Result, RoutingError};

/// Tracks which model currently serves each conversation.
#[async_trait]
pub trait ConversationModels: Send + Sync {
    /// Model currently bound to `conversation_id`.
    async fn current_model(&self, conversation_id: &str) -> Option<String>;

    /// Binds `conversation_id` to `model_id`.
    async fn set_current_model(&self, conversation_id: &str, model_id: &str);
}

/// Conversation bindings held in memory.
#[derive(Debug, Default)]
pub struct InMemoryConversationModels {
    /// Model id per conversation.
    models: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl ConversationModels for InMemoryConversationModels {
    async fn current_model(&self, conversation_id: &str) -> Option<String> {
        self.models.lock_ignore_poison().get(conversation_id).cloned()
    }

    async fn set_current_model(&self, conversation_id: &str, model_id: &str) {
        self.models
            .lock_ignore_poison()
            .insert(conversation_id.to_owned(), model_id.to_owned());
    }
}

/// Prompt and options of one execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    /// User prompt.
    pub prompt: String,
    /// Completion budget; the configured default applies when unset.
    pub max_tokens: Option<u32>,
    /// Conversation whose model binding is updated on success.
    pub conversation_id: Option<String>,
}

impl ExecutionRequest {
    /// Request for `prompt`.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Sets the completion budget.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the conversation.
    #[must_use]
    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }
}

/// Result of a successful execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    /// Generated text.
    pub text: String,
    /// Catalog id of the model that answered.
    pub model: String,
    /// Provider key of the adapter that answered.
    pub provider: String,
    /// Candidate ids in the order they were tried.
    pub attempted: Vec<String>,
    /// Selection notices followed by fallback notices.
    pub notices: Vec<String>,
    /// Whether the conversation moved to a different model.
    pub model_changed: bool,
}

/// Notice shown when a resilience failure forces a fallback.
fn fallback_notice(model: &SelectedModel, reason: FailureReason) -> String {
    match reason {
        FailureReason::InsufficientBalance => format!(
            "{} on {} has insufficient balance, trying the next model",
            model.id(),
            model.provider
        ),
        FailureReason::QuotaExceeded => format!(
            "{} on {} reached its request quota, trying the next model",
            model.id(),
            model.provider
        ),
        FailureReason::ProviderError | FailureReason::UnknownError => {
            format!("{} on {} failed, trying the next model", model.id(), model.provider)
        }
    }
}

/// Executes prompts against ranked candidates.
pub struct RequestExecutor {
    /// Adapters by provider key.
    registry: Arc<ProviderRegistry>,
    /// Breaker shared with the selector.
    breaker: Arc<CircuitBreaker>,
    /// Conversation bindings, if tracked.
    conversations: Option<Arc<dyn ConversationModels>>,
    /// Handling of non-resilience failures.
    policy: TransientFailurePolicy,
    /// Completion budget when the request sets none.
    default_max_tokens: Option<u32>,
}

impl RequestExecutor {
    /// Executor over `registry` sharing `breaker` with the selector.
    pub fn new(registry: Arc<ProviderRegistry>, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            registry,
            breaker,
            conversations: None,
            policy: TransientFailurePolicy::default(),
            default_max_tokens: None,
        }
    }

    /// Applies the failure policy and default budget from configuration.
    #[must_use]
    pub fn with_config(mut self, config: &ExecutionConfig) -> Self {
        self.policy = config.transient_failure_policy;
        self.default_max_tokens = Some(config.default_max_tokens);
        self
    }

    /// Updates conversation bindings after each success.
    #[must_use]
    pub fn with_conversations(mut self, conversations: Arc<dyn ConversationModels>) -> Self {
        self.conversations = Some(conversations);
        self
    }

    /// Runs `request` against the selected model, then each alternative in order.
    ///
    /// Candidates whose provider is not registered or not usable are skipped
    /// without counting as an attempt.
    ///
    /// # Errors
    /// Returns `AllCandidatesFailed` when no candidate produced text.
    pub async fn execute(
        &self,
        selection: &SelectionResult,
        request: &ExecutionRequest,
    ) -> Result<ExecutionOutcome> {
        let max_tokens = request.max_tokens.or(self.default_max_tokens);
        let mut notices = selection.notices.clone();
        let mut attempted = Vec::new();
        let mut last_cause: Option<ProviderError> = None;

        for candidate in selection.candidates() {
            let Some(provider) = self
                .registry
                .get_provider(&candidate.provider)
                .filter(|provider| provider.is_available())
            else {
                debug!(
                    "Skipping {}: provider {} is not configured",
                    candidate.id(),
                    candidate.provider
                );
                continue;
            };

            attempted.push(candidate.id().to_owned());
            match provider
                .generate_text(&request.prompt, max_tokens, Some(&candidate.model))
                .await
            {
                Ok(text) => {
                    self.breaker.record_success(candidate.id());
                    let model_changed = self
                        .bind_conversation(request.conversation_id.as_deref(), candidate.id())
                        .await;
                    info!(
                        "Request served by {} via {} after {} attempt(s)",
                        candidate.id(),
                        candidate.provider,
                        attempted.len()
                    );
                    return Ok(ExecutionOutcome {
                        text,
                        model: candidate.id().to_owned(),
                        provider: candidate.provider.clone(),
                        attempted,
                        notices,
                        model_changed,
                    });
                }
                Err(error) if error.is_resilience() => {
                    let reason = error.failure_reason();
                    warn!("{} unavailable ({reason}): {error}", candidate.id());
                    self.breaker.record_failure(candidate.id(), Some(reason));
                    notices.push(fallback_notice(candidate, reason));
                    last_cause = Some(error);
                }
                Err(error) => {
                    warn!("{} failed: {error}", candidate.id());
                    if self.policy == TransientFailurePolicy::Record {
                        self.breaker
                            .record_failure(candidate.id(), Some(error.failure_reason()));
                    }
                    last_cause = Some(error);
                }
            }
        }

        warn!("Every candidate failed after {} attempt(s)", attempted.len());
        Err(RoutingError::AllCandidatesFailed {
            attempted,
            last_cause,
        })
    }

    /// Binds the conversation to `model_id`, returning whether it changed.
    async fn bind_conversation(&self, conversation_id: Option<&str>, model_id: &str) -> bool {
        let (Some(conversations), Some(conversation_id)) = (&self.conversations, conversation_id)
        else {
            return false;
        };

        let current = conversations.current_model(conversation_id).await;
        if current.as_deref() == Some(model_id) {
            return false;
        }
        info!(
            "Conversation {conversation_id} moved from {} to {model_id}",
            current.as_deref().unwrap_or("none")
        );
        conversations
            .set_current_model(conversation_id, model_id)
            .await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitState;
    use crate::strategies::Strategy;
    use switchboard_core::Candidate;
    use switchboard_providers::MockProvider;

    fn selection(ids: &[&str]) -> SelectionResult {
        let mut models = ids
            .iter()
            .map(|id| SelectedModel::from_candidate(Candidate::new(*id).with_provider("groq")));
        let selected_model = models.next().expect("at least one model");
        SelectionResult {
            selected_model,
            alternatives: models.collect(),
            strategy_used: Strategy::Performance,
            decision_log: Vec::new(),
            notices: Vec::new(),
        }
    }

    fn build_executor(provider: MockProvider) -> (RequestExecutor, Arc<CircuitBreaker>) {
        let breaker = Arc::new(CircuitBreaker::default());
        let registry = ProviderRegistry::new().with_provider(Arc::new(provider));
        (
            RequestExecutor::new(Arc::new(registry), Arc::clone(&breaker)),
            breaker,
        )
    }

    #[tokio::test]
    async fn test_quota_failure_falls_back_and_opens_circuit() {
        let provider = MockProvider::new("groq")
            .with_failure("a", ProviderError::from_status(429, "groq", "a", "slow down"))
            .with_response("b", "from b");
        let (executor, breaker) = build_executor(provider.clone());

        let outcome = executor
            .execute(&selection(&["a", "b"]), &ExecutionRequest::new("hi"))
            .await
            .expect("fallback should succeed");

        assert_eq!(outcome.text, "from b");
        assert_eq!(outcome.model, "b");
        assert_eq!(outcome.attempted, vec!["a", "b"]);
        assert_eq!(outcome.notices.len(), 1);
        assert!(outcome.notices[0].contains("quota"));
        assert_eq!(breaker.state("a"), CircuitState::Open);
        assert_eq!(provider.get_call_history(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_generic_failures_follow_policy() {
        let provider = MockProvider::new("groq")
            .with_failure("a", ProviderError::llm("groq", "a", "boom"))
            .with_response("b", "ok");

        let (ignoring, breaker) = build_executor(provider.clone());
        ignoring
            .execute(&selection(&["a", "b"]), &ExecutionRequest::new("hi"))
            .await
            .expect("fallback should succeed");
        assert!(breaker.entry("a").is_none());

        let (recording, breaker) = build_executor(provider);
        let recording = recording.with_config(&ExecutionConfig {
            transient_failure_policy: TransientFailurePolicy::Record,
            ..ExecutionConfig::default()
        });
        recording
            .execute(&selection(&["a", "b"]), &ExecutionRequest::new("hi"))
            .await
            .expect("fallback should succeed");
        assert_eq!(breaker.entry("a").map(|entry| entry.failure_count), Some(1));
        assert_eq!(breaker.state("a"), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempts() {
        let provider = MockProvider::new("groq")
            .with_failure("a", ProviderError::from_status(402, "groq", "a", "pay up"))
            .with_failure("b", ProviderError::from_status(429, "groq", "b", "slow down"));
        let (executor, _breaker) = build_executor(provider);

        let error = executor
            .execute(&selection(&["a", "b"]), &ExecutionRequest::new("hi"))
            .await
            .unwrap_err();
        match &error {
            RoutingError::AllCandidatesFailed { attempted, .. } => {
                assert_eq!(attempted, &vec!["a".to_owned(), "b".to_owned()]);
            }
            other => panic!("expected exhaustion, got {other}"),
        }
        assert!(error.is_rate_limited());
    }

    #[tokio::test]
    async fn test_unregistered_provider_is_skipped() {
        let (executor, _breaker) = build_executor(MockProvider::new("groq").with_response("b", "ok"));
        let mut chosen = selection(&["a", "b"]);
        chosen.selected_model = SelectedModel::from_candidate(Candidate::new("a").with_provider("together"));

        let outcome = executor
            .execute(&chosen, &ExecutionRequest::new("hi"))
            .await
            .expect("second candidate should answer");
        assert_eq!(outcome.attempted, vec!["b"]);
    }

    #[tokio::test]
    async fn test_success_closes_circuit_and_binds_conversation() {
        let provider = MockProvider::new("groq").with_response("a", "ok");
        let (executor, breaker) = build_executor(provider);
        let conversations = Arc::new(InMemoryConversationModels::default());
        let executor = executor.with_conversations(Arc::clone(&conversations) as Arc<dyn ConversationModels>);
        breaker.record_failure("a", None);

        let request = ExecutionRequest::new("hi").with_conversation("conv-1");
        let first = executor
            .execute(&selection(&["a"]), &request)
            .await
            .expect("execution");
        assert!(first.model_changed);
        assert!(breaker.entry("a").is_none());
        assert_eq!(conversations.current_model("conv-1").await.as_deref(), Some("a"));

        let second = executor
            .execute(&selection(&["a"]), &request)
            .await
            .expect("execution");
        assert!(!second.model_changed);
    }
}
