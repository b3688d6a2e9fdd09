use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use switchboard_core::{
    Error, ProviderError, ProviderResult, Result, TextProvider, TokenUsage, UsageRecorder,
};

use crate::http::{build_client, summarize_body};

/// Default completion budget.
const DEFAULT_MAX_TOKENS: u32 = 500;

/// Static description of an OpenAI-compatible provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Provider key used by the registry and the circuit breaker notices.
    pub name: &'static str,
    /// API base URL, without the `/chat/completions` suffix.
    pub base_url: &'static str,
    /// Model used when the caller does not name one.
    pub default_model: &'static str,
    /// Environment variable holding the API key.
    pub api_key_env: &'static str,
}

/// `OpenRouter` multi-vendor gateway.
pub const OPENROUTER: ProviderProfile = ProviderProfile {
    name: "openrouter",
    base_url: "https://openrouter.ai/api/v1",
    default_model: "openai/gpt-3.5-turbo",
    api_key_env: "OPENROUTER_API_KEY",
};

/// Groq inference API.
pub const GROQ: ProviderProfile = ProviderProfile {
    name: "groq",
    base_url: "https://api.groq.com/openai/v1",
    default_model: "llama-3.1-8b-instant",
    api_key_env: "GROQ_API_KEY",
};

/// Together AI inference API.
pub const TOGETHER: ProviderProfile = ProviderProfile {
    name: "together",
    base_url: "https://api.together.xyz/v1",
    default_model: "meta-llama/Llama-3-8b-chat-hf",
    api_key_env: "TOGETHER_API_KEY",
};

/// Adapter for any provider exposing an OpenAI-compatible chat completions endpoint.
pub struct ChatCompletionsProvider {
    /// HTTP client for API requests.
    client: Client,
    /// Provider description.
    profile: ProviderProfile,
    /// API key sent as a bearer token.
    api_key: String,
    /// Base URL, defaulting to the profile's.
    base_url: String,
    /// Model used when the caller does not name one.
    model: String,
    /// Completion budget used when the caller does not set one.
    default_max_tokens: u32,
    /// Optional sink for token accounting.
    usage_recorder: Option<Arc<dyn UsageRecorder>>,
}

impl ChatCompletionsProvider {
    /// Creates an adapter for the given profile and API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the provided API key is empty.
    pub fn new(profile: ProviderProfile, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::MissingApiKey(profile.api_key_env.to_owned()));
        }

        Ok(Self {
            client: Client::default(),
            profile,
            api_key,
            base_url: profile.base_url.to_owned(),
            model: profile.default_model.to_owned(),
            default_max_tokens: DEFAULT_MAX_TOKENS,
            usage_recorder: None,
        })
    }

    /// Creates an adapter reading the API key from the profile's environment variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment variable is not set.
    pub fn from_env(profile: ProviderProfile) -> Result<Self> {
        let api_key = env::var(profile.api_key_env)
            .map_err(|_| Error::MissingApiKey(profile.api_key_env.to_owned()))?;
        Self::new(profile, api_key)
    }

    /// Creates an `OpenRouter` adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if the provided API key is empty.
    pub fn openrouter(api_key: String) -> Result<Self> {
        Self::new(OPENROUTER, api_key)
    }

    /// Creates a Groq adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if the provided API key is empty.
    pub fn groq(api_key: String) -> Result<Self> {
        Self::new(GROQ, api_key)
    }

    /// Creates a Together AI adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if the provided API key is empty.
    pub fn together(api_key: String) -> Result<Self> {
        Self::new(TOGETHER, api_key)
    }

    /// Sets the default model.
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Overrides the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the default completion budget.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.default_max_tokens = max_tokens;
        self
    }

    /// Reports token usage of successful completions to `recorder`.
    #[must_use]
    pub fn with_usage_recorder(mut self, recorder: Arc<dyn UsageRecorder>) -> Self {
        self.usage_recorder = Some(recorder);
        self
    }

    /// Bounds every request by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    /// Default model of this adapter.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Full chat completions URL.
    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Request payload sent to the chat completions endpoint.
#[derive(Debug, Serialize)]
struct ChatRequest<'req> {
    /// Model identifier.
    model: &'req str,
    /// Conversation, always a single user turn.
    messages: Vec<ChatMessage<'req>>,
    /// Maximum number of tokens allowed in the completion.
    max_tokens: u32,
}

/// Message delivered to the API.
#[derive(Debug, Serialize)]
struct ChatMessage<'req> {
    /// Role of the message author.
    role: &'static str,
    /// Textual content of the message.
    content: &'req str,
}

/// Response payload returned by the API.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    /// List of candidate completions.
    #[serde(default)]
    choices: Vec<ChatChoice>,
    /// Token accounting, when the provider reports it.
    #[serde(default)]
    usage: Option<ChatUsage>,
}

/// A single completion choice.
#[derive(Debug, Deserialize)]
struct ChatChoice {
    /// Message generated for the choice.
    message: ChatResponseMessage,
}

/// Response message containing the generated text.
#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    /// Generated text content.
    #[serde(default)]
    content: Option<String>,
}

/// Token usage metrics.
#[derive(Debug, Deserialize)]
struct ChatUsage {
    /// Number of tokens in the prompt.
    #[serde(default)]
    prompt_tokens: u64,
    /// Number of tokens in the completion.
    #[serde(default)]
    completion_tokens: u64,
}

#[async_trait]
impl TextProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        self.profile.name
    }

    fn is_available(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn generate_text(
        &self,
        prompt: &str,
        max_tokens: Option<u32>,
        model_name: Option<&str>,
    ) -> ProviderResult<String> {
        let provider = self.profile.name;
        let model = model_name.unwrap_or(&self.model);
        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: max_tokens.unwrap_or(self.default_max_tokens),
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| ProviderError::llm(provider, model, format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = summarize_body(&body);
            tracing::warn!("{provider} returned {status} for {model}: {detail}");
            return Err(ProviderError::from_status(
                status.as_u16(),
                provider,
                model,
                &detail,
            ));
        }

        let body: ChatResponse = response.json().await.map_err(|err| {
            ProviderError::llm(provider, model, format!("failed to parse response: {err}"))
        })?;

        if let (Some(recorder), Some(usage)) = (&self.usage_recorder, &body.usage) {
            recorder.record_usage(
                provider,
                model,
                TokenUsage {
                    input: usage.prompt_tokens,
                    output: usage.completion_tokens,
                },
            );
        }

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_owned())
            .ok_or_else(|| ProviderError::llm(provider, model, "response contained no choices"))
    }
}
