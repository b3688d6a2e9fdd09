//! Provider adapters for external LLM services.

/// OpenAI-compatible chat completions adapter.
pub mod chat_completions;
/// Google Gemini adapter.
pub mod gemini;
/// Shared HTTP helpers.
mod http;
/// Scriptable provider for tests.
pub mod mock;
/// Minimal payloads used to probe models.
pub mod placeholders;
/// HTTP transport for tier detection probes.
pub mod probe;

pub use chat_completions::{ChatCompletionsProvider, GROQ, OPENROUTER, ProviderProfile, TOGETHER};
pub use gemini::GeminiProvider;
pub use mock::MockProvider;
pub use probe::{HttpProbeTransport, parse_quota_headers};
