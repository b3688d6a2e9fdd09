//! Mock provider for testing selection and fallback.
//!
//! Allows scripting a reply or a failure per model, enabling end-to-end
//! tests of the execution loop without real API calls.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use switchboard_core::{IgnoreLock as _, ProviderError, ProviderResult, TextProvider};

/// Scripted reply for a model.
#[derive(Debug, Clone)]
enum MockReply {
    /// Successful completion.
    Text(String),
    /// Adapter failure.
    Failure(ProviderError),
}

/// Reply storage type
type ReplyMap = Arc<Mutex<HashMap<String, MockReply>>>;

/// Mock provider that returns scripted replies keyed by model name.
#[derive(Clone)]
pub struct MockProvider {
    /// Provider key this mock stands in for
    name: String,
    /// Whether the mock reports itself as configured
    available: bool,
    /// Scripted replies keyed by model name
    replies: ReplyMap,
    /// Default response if no model matches
    default_response: Arc<Mutex<Option<String>>>,
    /// Models called, in order
    call_history: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    /// Create a new mock provider registered under `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: true,
            replies: Arc::new(Mutex::new(HashMap::new())),
            default_response: Arc::new(Mutex::new(None)),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Reply with `response` when `model` is called.
    #[must_use]
    pub fn with_response(self, model: impl Into<String>, response: impl Into<String>) -> Self {
        {
            let mut replies = self.replies.lock_ignore_poison();
            replies.insert(model.into(), MockReply::Text(response.into()));
        }
        self
    }

    /// Fail with `error` when `model` is called.
    #[must_use]
    pub fn with_failure(self, model: impl Into<String>, error: ProviderError) -> Self {
        {
            let mut replies = self.replies.lock_ignore_poison();
            replies.insert(model.into(), MockReply::Failure(error));
        }
        self
    }

    /// Set a default response for models without a scripted reply.
    #[must_use]
    pub fn with_default_response(self, response: impl Into<String>) -> Self {
        {
            let mut default = self.default_response.lock_ignore_poison();
            *default = Some(response.into());
        }
        self
    }

    /// Report the mock as not configured.
    #[must_use]
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Clear the call history (used for testing).
    pub fn clear_history(&self) {
        let mut history = self.call_history.lock_ignore_poison();
        history.clear();
    }

    /// Get the call history (models called, in order).
    #[must_use]
    pub fn get_call_history(&self) -> Vec<String> {
        let history = self.call_history.lock_ignore_poison();
        history.clone()
    }

    /// Get the number of calls made.
    #[must_use]
    pub fn call_count(&self) -> usize {
        let history = self.call_history.lock_ignore_poison();
        history.len()
    }
}

#[async_trait]
impl TextProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn generate_text(
        &self,
        prompt: &str,
        _max_tokens: Option<u32>,
        model_name: Option<&str>,
    ) -> ProviderResult<String> {
        let model = model_name.unwrap_or("mock-model").to_owned();
        {
            let mut history = self.call_history.lock_ignore_poison();
            history.push(model.clone());
        }

        let scripted = self.replies.lock_ignore_poison().get(&model).cloned();
        match scripted {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Failure(error)) => Err(error),
            None => {
                let default = self.default_response.lock_ignore_poison();
                Ok(default
                    .clone()
                    .unwrap_or_else(|| format!("Mock response from {model} for: {prompt}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replies_and_history() {
        let provider = MockProvider::new("groq")
            .with_response("fast", "quick answer")
            .with_failure(
                "broken",
                ProviderError::from_status(429, "groq", "broken", "slow down"),
            );

        let ok = provider.generate_text("hi", None, Some("fast")).await;
        assert_eq!(ok, Ok("quick answer".to_owned()));

        let failed = provider.generate_text("hi", None, Some("broken")).await;
        assert!(matches!(failed, Err(ProviderError::QuotaExceeded { .. })));

        let fallback = provider.generate_text("hi", None, Some("other")).await;
        assert_eq!(fallback, Ok("Mock response from other for: hi".to_owned()));

        assert_eq!(provider.get_call_history(), vec!["fast", "broken", "other"]);
        provider.clear_history();
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_default_response_and_availability() {
        let provider = MockProvider::new("gemini")
            .with_default_response("default")
            .unavailable();
        assert!(!provider.is_available());
        assert_eq!(provider.name(), "gemini");
        assert_eq!(
            provider.generate_text("x", Some(5), None).await,
            Ok("default".to_owned())
        );
    }
}
