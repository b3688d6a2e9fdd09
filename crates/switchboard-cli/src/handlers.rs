use anyhow::{Context as _, Result, anyhow};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use switchboard_core::{Capability, Category, SwitchboardConfig};
use switchboard_providers::HttpProbeTransport;
use switchboard_routing::{
    ExecutionRequest, ProviderPayload, SelectionRequest, StaticCatalog, Switchboard, TierDetector,
};
use tokio::fs as async_fs;

use crate::cli::{Cli, Commands, SelectArgs};

/// Dispatches a parsed command line, returning the text to print.
///
/// # Errors
/// Returns an error if the configuration, catalog or payload file cannot be
/// loaded, or if the command itself fails.
pub async fn run(cli: Cli) -> Result<String> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Select(args) => handle_select(&config, &args).await,
        Commands::Generate {
            selection,
            prompt,
            max_tokens,
        } => handle_generate(&config, &selection, prompt, max_tokens).await,
        Commands::Tiers { payloads, user } => handle_tiers(&config, &payloads, &user).await,
        Commands::Config => handle_config(cli.config.as_deref(), &config),
    }
}

/// Loads the configuration from `path`, or from `~/.switchboard/config.toml`.
///
/// A broken default file falls back to the built-in defaults; an explicit
/// path must load.
///
/// # Errors
/// Returns an error if an explicit file cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<SwitchboardConfig> {
    if let Some(path) = path {
        return SwitchboardConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    Ok(SwitchboardConfig::load_or_create().unwrap_or_else(|error| {
        tracing::warn!("Failed to load config from ~/.switchboard/config.toml: {error}");
        tracing::warn!("Using default configuration");
        SwitchboardConfig::default()
    }))
}

/// Builds the selection request described by `args`.
///
/// # Errors
/// Returns an error if a capability name is not recognized.
pub fn selection_request(args: &SelectArgs) -> Result<SelectionRequest> {
    let capabilities = args
        .capabilities
        .iter()
        .map(|name| name.parse::<Capability>().map_err(|error| anyhow!(error)))
        .collect::<Result<Vec<_>>>()?;

    let mut request = SelectionRequest::new(args.user.clone(), Category::from(args.category.as_str()))
        .with_capabilities(capabilities);
    if let Some(strategy) = &args.strategy {
        request = request.with_strategy(strategy.clone());
    }
    if let Some(ceiling) = args.max_cost {
        request = request.with_cost_ceiling(ceiling);
    }
    Ok(request)
}

/// Switchboard serving the catalog file named by `args`.
fn switchboard_for(config: &SwitchboardConfig, args: &SelectArgs) -> Result<Switchboard> {
    let catalog = StaticCatalog::from_json_file(&args.catalog)
        .with_context(|| format!("Failed to load catalog from {}", args.catalog.display()))?;
    tracing::debug!("Loaded {} candidates", catalog.candidates().len());
    Ok(Switchboard::from_config(config, Arc::new(catalog))?)
}

/// Ranks the catalog and prints the selection with its decision log.
///
/// # Errors
/// Returns an error if the catalog cannot be loaded or selection fails.
pub async fn handle_select(config: &SwitchboardConfig, args: &SelectArgs) -> Result<String> {
    let switchboard = switchboard_for(config, args)?;
    let selection = switchboard.select(&selection_request(args)?).await?;
    Ok(serde_json::to_string_pretty(&selection)?)
}

/// Sends `prompt` to the selected model and prints the outcome with token usage.
///
/// # Errors
/// Returns an error if selection fails or every candidate fails.
pub async fn handle_generate(
    config: &SwitchboardConfig,
    args: &SelectArgs,
    prompt: String,
    max_tokens: Option<u32>,
) -> Result<String> {
    let switchboard = switchboard_for(config, args)?;
    let mut execution = ExecutionRequest::new(prompt);
    if let Some(max_tokens) = max_tokens {
        execution = execution.with_max_tokens(max_tokens);
    }

    let outcome = match switchboard
        .generate(&selection_request(args)?, &execution)
        .await
    {
        Ok(outcome) => outcome,
        Err(error) => {
            tracing::error!("Generation failed (HTTP {}): {error}", error.http_status());
            return Err(error.into());
        }
    };

    let usage: BTreeMap<_, _> = switchboard.usage().totals().into_iter().collect();
    let report = json!({ "outcome": outcome, "usage": usage });
    Ok(serde_json::to_string_pretty(&report)?)
}

/// Probes the models listed in `payloads` and prints one record per model.
///
/// # Errors
/// Returns an error if the payload file cannot be read or parsed.
pub async fn handle_tiers(config: &SwitchboardConfig, payloads: &Path, user: &str) -> Result<String> {
    let contents = async_fs::read_to_string(payloads)
        .await
        .with_context(|| format!("Failed to read {}", payloads.display()))?;
    let provider_payloads: Vec<ProviderPayload> =
        serde_json::from_str(&contents).context("Invalid provider payload list")?;

    let transport = HttpProbeTransport::from_config(&config.providers);
    let detector = TierDetector::new(Arc::new(transport), config.detector.clone());

    let records: BTreeMap<_, _> = detector
        .detect_all_models(user, &provider_payloads)
        .await
        .into_iter()
        .collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

/// Prints the configuration path and the providers that have a key.
///
/// # Errors
/// Returns an error if the default path cannot be determined.
pub fn handle_config(path: Option<&Path>, config: &SwitchboardConfig) -> Result<String> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => SwitchboardConfig::config_path()?,
    };
    let report = json!({
        "path": path.display().to_string(),
        "configured_providers": config.configured_providers(),
        "breaker": config.breaker,
        "selector": config.selector,
        "execution": config.execution,
        "detector": config.detector,
    });
    Ok(serde_json::to_string_pretty(&report)?)
}
