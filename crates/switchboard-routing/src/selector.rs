//! Model selection.
//!
//! Selection runs the catalog through the capability filter, the breaker-backed
//! availability filter and a ranking strategy. Every step appends a line to the
//! decision log so a caller can explain why a model was chosen.

use core::iter;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use switchboard_core::{Candidate, Capability, Category, FailureReason, SelectorConfig};
use tracing::{debug, info, warn};

use crate::availability::AvailabilityService;
use crate::breaker::{CircuitBreaker, CircuitState};
use crate::capability::{describe_capabilities, filter_by_capabilities};
use crate::catalog::{CatalogSource, PreferenceSource, UserPreferences};
use crate::strategies::{RankingStrategies, Strategy};
use crate::{Result, RoutingError};

/// Number of top capable candidates inspected for breaker notices.
pub const NOTICE_INSPECTION_DEPTH: usize = 3;

/// Notice emitted when a top candidate is open on insufficient balance.
pub const INSUFFICIENT_BALANCE_NOTICE: &str = "performance strategy limited by insufficient balance on premium providers, migrating to available fallbacks";

/// Notice emitted when a top candidate is open on quota exhaustion.
pub const QUOTA_EXCEEDED_NOTICE: &str =
    "request quota reached on main models, using available alternatives";

/// Notice emitted when every capable candidate is open.
pub const ALL_DOWN_NOTICE: &str =
    "all capable models are temporarily failing; retrying them anyway";

/// Notice emitted when the free strategy matches nothing and ranking falls back to performance.
pub const FREE_UNAVAILABLE_NOTICE: &str =
    "no free models available for this request; using performance ranking";

/// Providers a catalog source maps onto directly.
const SOURCE_PROVIDERS: [&str; 4] = ["openrouter", "groq", "together", "gemini"];

/// Request for a model.
#[derive(Debug, Clone, Default)]
pub struct SelectionRequest {
    /// User whose preferences apply.
    pub user_id: String,
    /// Request category.
    pub category: Category,
    /// Capabilities the chosen model must support.
    pub required_capabilities: BTreeSet<Capability>,
    /// Calling function, used by legacy per-function preferences.
    pub function_name: Option<String>,
    /// Strategy override.
    pub strategy: Option<String>,
    /// Cost ceiling in USD; logged but not enforced.
    pub max_cost_usd: Option<f64>,
}

impl SelectionRequest {
    /// Request for `user_id` in `category` with no requirements.
    pub fn new(user_id: impl Into<String>, category: Category) -> Self {
        Self {
            user_id: user_id.into(),
            category,
            ..Self::default()
        }
    }

    /// Requires `capabilities`.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.required_capabilities.extend(capabilities);
        self
    }

    /// Overrides the strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    /// Names the calling function.
    #[must_use]
    pub fn with_function(mut self, function_name: impl Into<String>) -> Self {
        self.function_name = Some(function_name.into());
        self
    }

    /// Attaches a cost ceiling.
    #[must_use]
    pub fn with_cost_ceiling(mut self, max_cost_usd: f64) -> Self {
        self.max_cost_usd = Some(max_cost_usd);
        self
    }
}

/// A candidate resolved to the adapter that serves it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedModel {
    /// Provider key of the serving adapter.
    pub provider: String,
    /// Model name sent upstream.
    pub model: String,
    /// Catalog entry.
    pub candidate: Candidate,
}

impl SelectedModel {
    /// Resolves `candidate` to its provider and upstream model.
    pub fn from_candidate(candidate: Candidate) -> Self {
        Self {
            provider: resolve_provider(&candidate),
            model: candidate.upstream_model().to_owned(),
            candidate,
        }
    }

    /// Catalog id, which is also the breaker key.
    pub fn id(&self) -> &str {
        &self.candidate.id
    }
}

/// Outcome of a selection.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionResult {
    /// Best ranked model.
    pub selected_model: SelectedModel,
    /// Remaining ranked models, best first.
    pub alternatives: Vec<SelectedModel>,
    /// Strategy that produced the ranking.
    pub strategy_used: Strategy,
    /// One line per selection step.
    pub decision_log: Vec<String>,
    /// User facing notices, deduplicated.
    pub notices: Vec<String>,
}

impl SelectionResult {
    /// The selected model followed by the alternatives.
    pub fn candidates(&self) -> impl Iterator<Item = &SelectedModel> {
        iter::once(&self.selected_model).chain(self.alternatives.iter())
    }
}

/// Provider key that serves `candidate`.
///
/// An explicit provider wins, then a known source, then `openai` for GPT
/// names; everything else is served by Gemini.
pub fn resolve_provider(candidate: &Candidate) -> String {
    if let Some(provider) = &candidate.provider {
        return provider.to_lowercase();
    }
    let source = candidate.source_lower();
    if SOURCE_PROVIDERS.contains(&source.as_str()) {
        return source;
    }
    if candidate.search_name().contains("gpt") {
        return "openai".to_owned();
    }
    "gemini".to_owned()
}

/// Pushes `notice` unless it is already present.
fn push_notice(notices: &mut Vec<String>, notice: &str) {
    if !notices.iter().any(|existing| existing == notice) {
        notices.push(notice.to_owned());
    }
}

/// Chooses a model for a request.
pub struct ModelSelector {
    /// Candidate source.
    catalog: Arc<dyn CatalogSource>,
    /// Stored user preferences, if any.
    preferences: Option<Arc<dyn PreferenceSource>>,
    /// Breaker-backed availability filter.
    availability: AvailabilityService,
    /// Ranking strategies.
    ranking: RankingStrategies,
    /// Capable candidates inspected for breaker notices.
    notice_depth: usize,
    /// Strategy used when nothing else decides.
    default_strategy: Strategy,
}

impl ModelSelector {
    /// Selector over `catalog` sharing `breaker` with the execution loop.
    pub fn new(catalog: Arc<dyn CatalogSource>, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            catalog,
            preferences: None,
            availability: AvailabilityService::new(breaker),
            ranking: RankingStrategies::default(),
            notice_depth: NOTICE_INSPECTION_DEPTH,
            default_strategy: Strategy::default(),
        }
    }

    /// Reads user preferences from `preferences`.
    #[must_use]
    pub fn with_preferences(mut self, preferences: Arc<dyn PreferenceSource>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Replaces the ranking strategies.
    #[must_use]
    pub fn with_ranking(mut self, ranking: RankingStrategies) -> Self {
        self.ranking = ranking;
        self
    }

    /// Applies the notice depth and default strategy from configuration.
    #[must_use]
    pub fn with_config(mut self, config: &SelectorConfig) -> Self {
        self.notice_depth = config.notice_inspection_depth;
        self.default_strategy = Strategy::parse_or_default(&config.default_strategy);
        self
    }

    /// Selects a model for `request`.
    ///
    /// # Errors
    /// Returns an error if the catalog is empty or unreadable, or if no
    /// candidate supports the required capabilities.
    pub async fn select_model(&self, request: &SelectionRequest) -> Result<SelectionResult> {
        let candidates = self.catalog.active_candidates().await?;
        let mut decision_log = vec![format!("Initial candidates: {}", candidates.len())];
        if candidates.is_empty() {
            return Err(RoutingError::EmptyCatalog);
        }

        decision_log.push(format!("Category: {}", request.category));
        let strategy = self.resolve_strategy(request).await;
        decision_log.push(format!("Strategy: {strategy}"));
        if let Some(ceiling) = request.max_cost_usd {
            decision_log.push(format!("Cost ceiling: ${ceiling:.4} (informational)"));
        }

        let required = describe_capabilities(&request.required_capabilities);
        let capable = filter_by_capabilities(&candidates, &request.required_capabilities);
        decision_log.push(format!(
            "After Capability Filter ({required}): {}",
            capable.len()
        ));
        if capable.is_empty() {
            return Err(RoutingError::NoCapableModel { required });
        }

        let mut notices = Vec::new();
        let mut available = self.availability.filter_available(&capable);
        decision_log.push(format!("After Availability Filter: {}", available.len()));
        if available.is_empty() {
            warn!("All {} capable candidates are open, retrying them anyway", capable.len());
            decision_log.push("WARNING: All candidates down. Forcing retry on raw candidates.".to_owned());
            push_notice(&mut notices, ALL_DOWN_NOTICE);
            available.clone_from(&capable);
        }

        for notice in self.breaker_notices(&capable) {
            push_notice(&mut notices, notice);
        }

        let mut strategy_used = strategy;
        let mut ranked = self.ranking.apply_strategy(&available, strategy);
        if ranked.is_empty() {
            warn!("Strategy {strategy} matched no candidates, ranking by performance");
            decision_log.push(format!(
                "Strategy {strategy} matched no candidates, ranking by performance"
            ));
            if strategy == Strategy::Free {
                push_notice(&mut notices, FREE_UNAVAILABLE_NOTICE);
            }
            strategy_used = Strategy::Performance;
            ranked = self.ranking.apply_strategy(&available, strategy_used);
        }

        let mut ordered = ranked.into_iter().map(SelectedModel::from_candidate);
        let Some(selected_model) = ordered.next() else {
            return Err(RoutingError::NoCapableModel { required });
        };
        let alternatives: Vec<SelectedModel> = ordered.collect();

        info!(
            "Selected {} via {} (strategy {strategy_used}, {} alternatives)",
            selected_model.id(),
            selected_model.provider,
            alternatives.len()
        );

        Ok(SelectionResult {
            selected_model,
            alternatives,
            strategy_used,
            decision_log,
            notices,
        })
    }

    /// Strategy for `request`.
    ///
    /// Precedence: explicit override, free usage mode, category preference,
    /// global preference, legacy function preference, configured default.
    /// Invalid stored names are skipped.
    async fn resolve_strategy(&self, request: &SelectionRequest) -> Strategy {
        if let Some(name) = &request.strategy {
            match name.parse() {
                Ok(strategy) => return strategy,
                Err(err) => warn!("Ignoring strategy override: {err}"),
            }
        }

        if let Some(preferences) = self.load_preferences(&request.user_id).await
            && let Some(strategy) = preferred_strategy(&preferences, request)
        {
            return strategy;
        }

        self.default_strategy
    }

    /// Preferences of `user_id`; lookup failures are logged and ignored.
    async fn load_preferences(&self, user_id: &str) -> Option<UserPreferences> {
        let source = self.preferences.as_ref()?;
        match source.preferences(user_id).await {
            Ok(preferences) => preferences,
            Err(err) => {
                warn!("Preference lookup for {user_id} failed: {err}");
                None
            }
        }
    }

    /// Notices explaining why top candidates are unavailable.
    fn breaker_notices(&self, capable: &[Candidate]) -> Vec<&'static str> {
        let breaker = self.availability.breaker();
        capable
            .iter()
            .take(self.notice_depth)
            .filter_map(|candidate| breaker.entry(&candidate.id))
            .filter(|entry| entry.state == CircuitState::Open)
            .filter_map(|entry| match entry.last_reason {
                Some(FailureReason::InsufficientBalance) => Some(INSUFFICIENT_BALANCE_NOTICE),
                Some(FailureReason::QuotaExceeded) => Some(QUOTA_EXCEEDED_NOTICE),
                Some(FailureReason::ProviderError | FailureReason::UnknownError) | None => None,
            })
            .collect()
    }
}

/// Strategy named by stored preferences, if any applies.
fn preferred_strategy(preferences: &UserPreferences, request: &SelectionRequest) -> Option<Strategy> {
    if preferences.is_free_mode() {
        return Some(Strategy::Free);
    }

    let parse = |name: &str| match name.parse::<Strategy>() {
        Ok(strategy) => Some(strategy),
        Err(err) => {
            debug!("Skipping stored preference: {err}");
            None
        }
    };

    let category = preferences
        .category_strategies
        .get(request.category.as_str())
        .filter(|name| !name.eq_ignore_ascii_case("global"))
        .and_then(|name| parse(name));
    let global = || preferences.global_strategy.as_deref().and_then(parse);
    let function = || {
        request
            .function_name
            .as_ref()
            .and_then(|function| preferences.function_strategies.get(function))
            .and_then(|name| parse(name))
    };

    category.or_else(global).or_else(function)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryPreferences, StaticCatalog};
    use std::collections::HashMap;

    fn selector(candidates: Vec<Candidate>) -> ModelSelector {
        ModelSelector::new(
            Arc::new(StaticCatalog::new(candidates)),
            Arc::new(CircuitBreaker::default()),
        )
    }

    fn with_prefs(prefs: UserPreferences) -> ModelSelector {
        selector(vec![Candidate::new("gemini-1.5-flash").with_score(1200.0)]).with_preferences(
            Arc::new(InMemoryPreferences::default().with_user("user", prefs)),
        )
    }

    #[test]
    fn test_resolve_provider_precedence() {
        assert_eq!(
            resolve_provider(&Candidate::new("x").with_provider("Groq").with_source("together")),
            "groq"
        );
        assert_eq!(
            resolve_provider(&Candidate::new("llama").with_source("OpenRouter")),
            "openrouter"
        );
        assert_eq!(resolve_provider(&Candidate::new("gpt-4o").with_source("lmsys")), "openai");
        assert_eq!(resolve_provider(&Candidate::new("claude-3-haiku")), "gemini");
    }

    #[test]
    fn test_selected_model_uses_api_model() {
        let selected = SelectedModel::from_candidate(
            Candidate::new("llama-3.1-8b")
                .with_source("groq")
                .with_api_model("llama-3.1-8b-instant"),
        );
        assert_eq!(selected.provider, "groq");
        assert_eq!(selected.model, "llama-3.1-8b-instant");
        assert_eq!(selected.id(), "llama-3.1-8b");
    }

    #[tokio::test]
    async fn test_empty_catalog_is_an_error() {
        let result = selector(Vec::new())
            .select_model(&SelectionRequest::new("user", Category::Text))
            .await;
        assert!(matches!(result, Err(RoutingError::EmptyCatalog)));
    }

    #[tokio::test]
    async fn test_missing_capability_is_an_error() {
        let request = SelectionRequest::new("user", Category::Video)
            .with_capabilities([Capability::VideoInput]);
        let result = selector(vec![Candidate::new("text-model")]).select_model(&request).await;
        match result {
            Err(RoutingError::NoCapableModel { required }) => assert_eq!(required, "[video_input]"),
            other => panic!("expected NoCapableModel, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_override_beats_preferences() {
        let selector = with_prefs(UserPreferences {
            usage_mode: Some("free".to_owned()),
            ..UserPreferences::default()
        });
        let request = SelectionRequest::new("user", Category::Text).with_strategy("speed");
        assert_eq!(selector.resolve_strategy(&request).await, Strategy::Speed);

        let request = SelectionRequest::new("user", Category::Text);
        assert_eq!(selector.resolve_strategy(&request).await, Strategy::Free);
    }

    #[tokio::test]
    async fn test_category_then_global_then_function() {
        let selector = with_prefs(UserPreferences {
            category_strategies: HashMap::from([
                ("code".to_owned(), "cost_benefit".to_owned()),
                ("vision".to_owned(), "global".to_owned()),
                ("audio".to_owned(), "bogus".to_owned()),
            ]),
            global_strategy: Some("speed".to_owned()),
            function_strategies: HashMap::from([("summarize".to_owned(), "free".to_owned())]),
            ..UserPreferences::default()
        });

        let code = SelectionRequest::new("user", Category::Code);
        assert_eq!(selector.resolve_strategy(&code).await, Strategy::CostBenefit);
        let vision = SelectionRequest::new("user", Category::Vision);
        assert_eq!(selector.resolve_strategy(&vision).await, Strategy::Speed);
        let audio = SelectionRequest::new("user", Category::Audio);
        assert_eq!(selector.resolve_strategy(&audio).await, Strategy::Speed);
    }

    #[tokio::test]
    async fn test_function_preference_and_default() {
        let selector = with_prefs(UserPreferences {
            function_strategies: HashMap::from([("summarize".to_owned(), "free".to_owned())]),
            ..UserPreferences::default()
        });
        let request = SelectionRequest::new("user", Category::Text).with_function("summarize");
        assert_eq!(selector.resolve_strategy(&request).await, Strategy::Free);

        let unknown_user = SelectionRequest::new("someone-else", Category::Text);
        assert_eq!(selector.resolve_strategy(&unknown_user).await, Strategy::Performance);
    }

    #[tokio::test]
    async fn test_invalid_override_is_skipped() {
        let selector = selector(vec![Candidate::new("a")]).with_config(&SelectorConfig {
            default_strategy: "speed".to_owned(),
            ..SelectorConfig::default()
        });
        let request = SelectionRequest::new("user", Category::Text).with_strategy("warp");
        assert_eq!(selector.resolve_strategy(&request).await, Strategy::Speed);
    }

    #[tokio::test]
    async fn test_free_with_no_match_falls_back_to_performance() {
        let request = SelectionRequest::new("user", Category::Text).with_strategy("free");
        let result = selector(vec![
            Candidate::new("claude-3-opus").with_score(1300.0),
            Candidate::new("gpt-4o").with_score(1280.0),
        ])
        .select_model(&request)
        .await
        .expect("selection should fall back");
        assert_eq!(result.selected_model.id(), "claude-3-opus");
        assert_eq!(result.strategy_used, Strategy::Performance);
        assert_eq!(result.notices, vec![FREE_UNAVAILABLE_NOTICE]);
        assert!(result
            .decision_log
            .iter()
            .any(|line| line.contains("matched no candidates")));
    }

    #[tokio::test]
    async fn test_cost_ceiling_is_logged() {
        let request = SelectionRequest::new("user", Category::Text).with_cost_ceiling(0.5);
        let result = selector(vec![Candidate::new("a")])
            .select_model(&request)
            .await
            .expect("selection");
        assert!(result
            .decision_log
            .contains(&"Cost ceiling: $0.5000 (informational)".to_owned()));
    }
}
