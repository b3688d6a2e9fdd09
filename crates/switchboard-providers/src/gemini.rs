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

/// Gemini API base URL.
const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Default model for Gemini.
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
/// Default completion budget for Gemini.
const DEFAULT_MAX_TOKENS: u32 = 2048;
/// Env var key for the Gemini API key.
const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
/// Provider key.
const PROVIDER: &str = "gemini";

/// Google Gemini `generateContent` adapter.
pub struct GeminiProvider {
    /// HTTP client for API requests.
    client: Client,
    /// Gemini API key.
    api_key: String,
    /// Base URL, overridable for tests.
    base_url: String,
    /// Model name to use.
    model: String,
    /// Optional sink for token accounting.
    usage_recorder: Option<Arc<dyn UsageRecorder>>,
}

impl GeminiProvider {
    /// Creates a new `GeminiProvider` with the given API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the provided API key is empty.
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::MissingApiKey(ENV_GEMINI_API_KEY.to_owned()));
        }

        Ok(Self {
            client: Client::default(),
            api_key,
            base_url: GEMINI_API_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            usage_recorder: None,
        })
    }

    /// Creates a new `GeminiProvider` from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the `GEMINI_API_KEY` environment variable is not set.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var(ENV_GEMINI_API_KEY)
            .map_err(|_| Error::MissingApiKey(ENV_GEMINI_API_KEY.to_owned()))?;
        Self::new(api_key)
    }

    /// Sets the model to use for generation.
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

    /// `generateContent` URL for a model.
    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{model}:generateContent",
            self.base_url.trim_end_matches('/')
        )
    }
}

/// Request payload for `generateContent`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'req> {
    /// Conversation turns.
    contents: Vec<GeminiContent<'req>>,
    /// Sampling limits.
    generation_config: GenerationConfig,
}

/// One conversation turn.
#[derive(Debug, Serialize)]
struct GeminiContent<'req> {
    /// Parts of the turn.
    parts: Vec<GeminiPart<'req>>,
}

/// Text part of a turn.
#[derive(Debug, Serialize)]
struct GeminiPart<'req> {
    /// Text content.
    text: &'req str,
}

/// Generation limits.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    /// Maximum number of output tokens.
    max_output_tokens: u32,
}

/// Response payload of `generateContent`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    /// Generated candidates.
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    /// Token accounting.
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

/// A single generated candidate.
#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    /// Generated content, absent when blocked.
    #[serde(default)]
    content: Option<GeminiResponseContent>,
}

/// Generated content.
#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    /// Generated parts.
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

/// Generated part.
#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    /// Generated text, absent for non-text parts.
    #[serde(default)]
    text: Option<String>,
}

/// Token usage metrics.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    /// Prompt tokens.
    #[serde(default)]
    prompt_token_count: u64,
    /// Completion tokens.
    #[serde(default)]
    candidates_token_count: u64,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
            .trim()
            .to_owned()
    }
}

#[async_trait]
impl TextProvider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER
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
        let model = model_name.unwrap_or(&self.model);
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            },
        };

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| ProviderError::llm(PROVIDER, model, format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = summarize_body(&body);
            tracing::warn!("Gemini returned {status} for {model}: {detail}");
            return Err(ProviderError::from_status(
                status.as_u16(),
                PROVIDER,
                model,
                &detail,
            ));
        }

        let body: GeminiResponse = response.json().await.map_err(|err| {
            ProviderError::llm(PROVIDER, model, format!("failed to parse response: {err}"))
        })?;

        let text = body.text();
        if text.is_empty() {
            return Err(ProviderError::llm(PROVIDER, model, "empty response"));
        }

        if let (Some(recorder), Some(usage)) = (&self.usage_recorder, &body.usage_metadata) {
            recorder.record_usage(
                PROVIDER,
                model,
                TokenUsage {
                    input: usage.prompt_token_count,
                    output: usage.candidates_token_count,
                },
            );
        }

        Ok(text)
    }
}
