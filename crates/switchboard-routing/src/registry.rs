//! Provider registry mapping provider keys to adapter instances.
//!
//! Adapters are built once from configuration and shared by every request,
//! so connection pools are reused across executions.

use std::collections::HashMap;
use std::sync::Arc;
use switchboard_core::{SwitchboardConfig, TextProvider, UsageRecorder};
use switchboard_providers::{ChatCompletionsProvider, GROQ, GeminiProvider, OPENROUTER, TOGETHER};

use crate::Result;

/// Registry of adapters keyed by provider key.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    /// Adapter per provider key.
    providers: HashMap<String, Arc<dyn TextProvider>>,
}

impl ProviderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter for every provider that has an API key.
    ///
    /// Base URL overrides and the request timeout come from `config.providers`;
    /// `usage` receives token accounting from every adapter.
    ///
    /// # Errors
    /// Returns an error if an adapter's HTTP client cannot be built.
    pub fn from_config(
        config: &SwitchboardConfig,
        usage: Option<&Arc<dyn UsageRecorder>>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        let timeout = config.providers.request_timeout();

        for profile in [OPENROUTER, GROQ, TOGETHER] {
            let Some(api_key) = config.get_api_key(profile.name) else {
                continue;
            };
            let mut provider = ChatCompletionsProvider::new(profile, api_key)?
                .with_timeout(timeout)?
                .with_max_tokens(config.execution.default_max_tokens);
            if let Some(base_url) = config.providers.base_url(profile.name) {
                provider = provider.with_base_url(base_url);
            }
            if let Some(recorder) = usage {
                provider = provider.with_usage_recorder(Arc::clone(recorder));
            }
            registry.register_provider(profile.name, Arc::new(provider));
        }

        if let Some(api_key) = config.get_api_key("gemini") {
            let mut provider = GeminiProvider::new(api_key)?.with_timeout(timeout)?;
            if let Some(base_url) = config.providers.base_url("gemini") {
                provider = provider.with_base_url(base_url);
            }
            if let Some(recorder) = usage {
                provider = provider.with_usage_recorder(Arc::clone(recorder));
            }
            registry.register_provider("gemini", Arc::new(provider));
        }

        tracing::debug!(
            "Provider registry initialized with {:?}",
            registry.registered_providers()
        );
        Ok(registry)
    }

    /// Registers `provider` under `key`, replacing any previous adapter.
    pub fn register_provider(&mut self, key: impl Into<String>, provider: Arc<dyn TextProvider>) {
        self.providers.insert(key.into(), provider);
    }

    /// Builder form registering `provider` under its own name.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn TextProvider>) -> Self {
        let key = provider.name().to_owned();
        self.register_provider(key, provider);
        self
    }

    /// Adapter registered under `key`.
    pub fn get_provider(&self, key: &str) -> Option<Arc<dyn TextProvider>> {
        self.providers.get(key).map(Arc::clone)
    }

    /// Whether an adapter is registered under `key` and reports itself usable.
    pub fn is_available(&self, key: &str) -> bool {
        self.providers
            .get(key)
            .is_some_and(|provider| provider.is_available())
    }

    /// Registered provider keys, sorted.
    pub fn registered_providers(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.providers.keys().cloned().collect();
        keys.sort();
        keys
    }
}
