//! Configuration for the breaker, selector, execution loop, tier detector and providers.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete switchboard configuration.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchboardConfig {
    /// API keys for model providers
    pub api_keys: ApiKeys,
    /// Circuit breaker thresholds
    pub breaker: BreakerConfig,
    /// Model selection settings
    pub selector: SelectorConfig,
    /// Request execution settings
    pub execution: ExecutionConfig,
    /// Tier detection settings
    pub detector: DetectorConfig,
    /// HTTP provider settings
    pub providers: ProviderConfig,
}

/// API keys for model providers.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ApiKeys {
    /// `OpenRouter` API key
    pub openrouter_api_key: Option<String>,
    /// Groq API key
    pub groq_api_key: Option<String>,
    /// Together AI API key
    pub together_api_key: Option<String>,
    /// Google Gemini API key
    pub gemini_api_key: Option<String>,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive generic failures that open a circuit
    pub failure_threshold: u32,
    /// Seconds an open circuit stays closed to traffic
    pub recovery_timeout_secs: u64,
    /// Upper bound on tracked models; unbounded when unset
    pub max_entries: Option<usize>,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout_secs: 300,
            max_entries: None,
        }
    }
}

impl BreakerConfig {
    /// Recovery timeout as a `Duration`.
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}

/// Model selector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// How many of the capable candidates are inspected for open-circuit notices
    pub notice_inspection_depth: usize,
    /// Strategy used when neither the request nor the user names one
    pub default_strategy: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            notice_inspection_depth: 3,
            default_strategy: "performance".to_owned(),
        }
    }
}

/// What the execution loop does with failures that are not resilience-class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientFailurePolicy {
    /// Log and move on without touching the breaker.
    #[default]
    Ignore,
    /// Count the failure against the model's circuit.
    Record,
}

/// Request execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Completion budget when the caller does not set one
    pub default_max_tokens: u32,
    /// Handling of transient or unclassified provider errors
    pub transient_failure_policy: TransientFailurePolicy,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_max_tokens: 500,
            transient_failure_policy: TransientFailurePolicy::Ignore,
        }
    }
}

/// Tier detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Lifetime of a per-user cache entry in seconds
    pub cache_ttl_secs: u64,
    /// Providers whose models are probed concurrently
    pub concurrent_services: Vec<String>,
    /// Concurrency bound for those providers
    pub max_concurrent_probes: usize,
    /// Per-attempt timeout for concurrent probes in milliseconds
    pub concurrent_probe_timeout_ms: u64,
    /// Per-attempt timeout for sequential probes in milliseconds
    pub sequential_probe_timeout_ms: u64,
    /// Delay between sequential probes in milliseconds
    pub sequential_delay_ms: u64,
    /// Extra attempts after a timeout or unclassified failure
    pub max_retries: u32,
    /// Linear backoff step between attempts in milliseconds
    pub retry_backoff_ms: u64,
    /// Providers whose video models reject text probes and are assumed paid
    pub video_assumption_services: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 3 * 60 * 60,
            concurrent_services: vec!["gemini".to_owned()],
            max_concurrent_probes: 5,
            concurrent_probe_timeout_ms: 8_000,
            sequential_probe_timeout_ms: 10_000,
            sequential_delay_ms: 100,
            max_retries: 2,
            retry_backoff_ms: 500,
            video_assumption_services: vec!["gemini".to_owned()],
        }
    }
}

impl DetectorConfig {
    /// Cache lifetime as a `Duration`.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Whether the provider is probed with bounded concurrency.
    pub fn is_concurrent(&self, service: &str) -> bool {
        self.concurrent_services
            .iter()
            .any(|name| name.eq_ignore_ascii_case(service))
    }

    /// Whether an unsupported text probe of a video model on `service` means a paid model.
    pub fn assumes_paid_video(&self, service: &str) -> bool {
        self.video_assumption_services
            .iter()
            .any(|name| name.eq_ignore_ascii_case(service))
    }

    /// Per-attempt timeout for the provider.
    pub fn probe_timeout(&self, service: &str) -> Duration {
        if self.is_concurrent(service) {
            Duration::from_millis(self.concurrent_probe_timeout_ms)
        } else {
            Duration::from_millis(self.sequential_probe_timeout_ms)
        }
    }
}

/// HTTP provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Timeout for a generation request in seconds
    pub request_timeout_secs: u64,
    /// Base URL overrides keyed by provider
    pub base_urls: HashMap<String, String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            base_urls: HashMap::new(),
        }
    }
}

impl ProviderConfig {
    /// Request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Base URL override for a provider.
    pub fn base_url(&self, provider: &str) -> Option<&str> {
        self.base_urls.get(provider).map(String::as_str)
    }
}

impl SwitchboardConfig {
    /// Get the default config directory path (`~/.switchboard`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".switchboard"))
    }

    /// Get the default config file path (`~/.switchboard/config.toml`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from the default location, writing defaults if it is missing.
    ///
    /// # Errors
    /// Returns an error if the config cannot be read or created
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            let config = Self::default();
            config.save_to_file(&config_path)?;
            Ok(config)
        }
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;

        tracing::debug!(
            "Loaded config from {:?}: providers with keys = {:?}",
            path,
            config.configured_providers()
        );

        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;

        let header = "# Switchboard Configuration File\n\
                      # This file is automatically generated on first run\n\
                      # Edit this file to customize your settings\n\n";

        fs::write(path, format!("{header}{contents}"))?;

        Ok(())
    }

    /// Get API key for a provider, checking config first, then environment variables
    pub fn get_api_key(&self, provider: &str) -> Option<String> {
        let (configured, env_key) = match provider {
            "openrouter" => (&self.api_keys.openrouter_api_key, "OPENROUTER_API_KEY"),
            "groq" => (&self.api_keys.groq_api_key, "GROQ_API_KEY"),
            "together" => (&self.api_keys.together_api_key, "TOGETHER_API_KEY"),
            "gemini" => (&self.api_keys.gemini_api_key, "GEMINI_API_KEY"),
            _ => return None,
        };
        configured
            .clone()
            .or_else(|| env::var(env_key).ok())
            .filter(|key| !key.trim().is_empty())
    }

    /// Providers that have a usable API key.
    pub fn configured_providers(&self) -> Vec<&'static str> {
        ["openrouter", "groq", "together", "gemini"]
            .into_iter()
            .filter(|provider| self.get_api_key(provider).is_some())
            .collect()
    }

    /// Rejects values that would make the breaker or detector misbehave.
    ///
    /// # Errors
    /// Returns a configuration error naming the offending field
    pub fn validate(&self) -> Result<()> {
        if self.breaker.failure_threshold == 0 {
            return Err(Error::Config(
                "breaker.failure_threshold must be at least 1".to_owned(),
            ));
        }
        if self.detector.max_concurrent_probes == 0 {
            return Err(Error::Config(
                "detector.max_concurrent_probes must be at least 1".to_owned(),
            ));
        }
        if self.breaker.max_entries == Some(0) {
            return Err(Error::Config(
                "breaker.max_entries must be at least 1 when set".to_owned(),
            ));
        }
        Ok(())
    }
}
