//! Model selection scenarios against a static catalog
#![cfg(test)]
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::absolute_paths,
    reason = "Test code prioritizes clarity over efficiency"
)]

mod common;

use common::{init_tracing, scenario_catalog, selector_over};
use std::collections::BTreeSet;
use std::sync::Arc;
use switchboard_core::{Candidate, Capability, Category, FailureReason};
use switchboard_routing::{
    ALL_DOWN_NOTICE, FREE_UNAVAILABLE_NOTICE, INSUFFICIENT_BALANCE_NOTICE, InMemoryPreferences,
    QUOTA_EXCEEDED_NOTICE, RankingStrategies, RoutingError, SelectionRequest, Strategy,
    UserPreferences, filter_by_capabilities,
};

fn text_request() -> SelectionRequest {
    SelectionRequest::new("user-1", Category::Text)
        .with_capabilities([Capability::TextInput])
        .with_strategy("performance")
}

#[tokio::test]
/// # Panics
/// Panics if the higher scored capable candidate is not selected.
async fn test_performance_selects_highest_score() {
    init_tracing();
    let (selector, _breaker) = selector_over(scenario_catalog());

    let result = selector
        .select_model(&text_request())
        .await
        .expect("selection should succeed");

    assert_eq!(result.selected_model.id(), "A");
    assert_eq!(result.selected_model.provider, "groq");
    assert_eq!(result.strategy_used, Strategy::Performance);
    assert_eq!(result.alternatives.len(), 1);
    assert_eq!(result.alternatives[0].id(), "B");
    assert!(result.notices.is_empty());
    assert_eq!(
        result.decision_log,
        vec![
            "Initial candidates: 2",
            "Category: text",
            "Strategy: performance",
            "After Capability Filter ([text_input]): 2",
            "After Availability Filter: 2",
        ]
    );
}

#[tokio::test]
/// # Panics
/// Panics if an open circuit does not move selection to the next candidate.
async fn test_open_circuit_moves_selection() {
    init_tracing();
    let (selector, breaker) = selector_over(scenario_catalog());
    for _ in 0..3 {
        breaker.record_failure("A", Some(FailureReason::ProviderError));
    }

    let result = selector
        .select_model(&text_request())
        .await
        .expect("selection should succeed");

    assert_eq!(result.selected_model.id(), "B");
    assert!(result.alternatives.is_empty());
    assert!(
        result
            .decision_log
            .contains(&"After Availability Filter: 1".to_owned())
    );
    assert!(result.notices.is_empty(), "generic failures produce no notice");
}

#[tokio::test]
/// # Panics
/// Panics if billing and quota circuits do not surface deduplicated notices.
async fn test_resilience_notices_are_deduplicated() {
    init_tracing();
    let candidates = vec![
        Candidate::new("premium-1").with_score(1300.0),
        Candidate::new("premium-2").with_score(1250.0),
        Candidate::new("quota-1").with_score(1200.0),
        Candidate::new("fallback").with_score(1000.0),
    ];
    let (selector, breaker) = selector_over(candidates);
    breaker.record_failure("premium-1", Some(FailureReason::InsufficientBalance));
    breaker.record_failure("premium-2", Some(FailureReason::InsufficientBalance));
    breaker.record_failure("quota-1", Some(FailureReason::QuotaExceeded));

    let result = selector
        .select_model(&SelectionRequest::new("user-1", Category::Text))
        .await
        .expect("selection should succeed");

    assert_eq!(result.selected_model.id(), "fallback");
    assert_eq!(
        result.notices,
        vec![INSUFFICIENT_BALANCE_NOTICE, QUOTA_EXCEEDED_NOTICE]
    );
}

#[tokio::test]
/// # Panics
/// Panics if notices are produced for candidates beyond the inspection depth.
async fn test_notices_only_inspect_top_candidates() {
    let candidates = vec![
        Candidate::new("a").with_score(4.0),
        Candidate::new("b").with_score(3.0),
        Candidate::new("c").with_score(2.0),
        Candidate::new("d").with_score(1.0),
    ];
    let (selector, breaker) = selector_over(candidates);
    breaker.record_failure("d", Some(FailureReason::QuotaExceeded));

    let result = selector
        .select_model(&SelectionRequest::new("user-1", Category::Text))
        .await
        .expect("selection should succeed");
    assert!(result.notices.is_empty());
    assert_eq!(result.alternatives.len(), 2);
}

#[tokio::test]
/// # Panics
/// Panics if an all-open catalog does not force a retry with a notice.
async fn test_all_candidates_down_forces_retry() {
    init_tracing();
    let (selector, breaker) = selector_over(scenario_catalog());
    breaker.record_failure("A", Some(FailureReason::QuotaExceeded));
    breaker.record_failure("B", Some(FailureReason::QuotaExceeded));

    let result = selector
        .select_model(&text_request())
        .await
        .expect("selection should still return candidates");

    assert_eq!(result.selected_model.id(), "A");
    assert_eq!(result.alternatives.len(), 1);
    assert!(!result.notices.is_empty());
    assert_eq!(result.notices[0], ALL_DOWN_NOTICE);
    assert!(result.notices.contains(&QUOTA_EXCEEDED_NOTICE.to_owned()));
    assert!(
        result
            .decision_log
            .contains(&"WARNING: All candidates down. Forcing retry on raw candidates.".to_owned())
    );
}

#[tokio::test]
/// # Panics
/// Panics if fatal selection errors are not raised.
async fn test_fatal_selection_errors() {
    let (empty, _breaker) = selector_over(Vec::new());
    let error = empty.select_model(&text_request()).await.unwrap_err();
    assert!(matches!(error, RoutingError::EmptyCatalog));
    assert!(error.is_fatal());

    let (selector, _breaker) = selector_over(scenario_catalog());
    let request = SelectionRequest::new("user-1", Category::Audio)
        .with_capabilities([Capability::AudioInput]);
    let error = selector.select_model(&request).await.unwrap_err();
    assert!(matches!(error, RoutingError::NoCapableModel { .. }));
    assert!(error.is_fatal());
}

#[tokio::test]
/// # Panics
/// Panics if image requirements do not narrow the candidates.
async fn test_capability_requirement_narrows_candidates() {
    let (selector, _breaker) = selector_over(scenario_catalog());
    let request = SelectionRequest::new("user-1", Category::Vision)
        .with_capabilities([Capability::TextInput, Capability::ImageInput]);

    let result = selector.select_model(&request).await.expect("selection");
    assert_eq!(result.selected_model.id(), "B");
    assert!(
        result
            .decision_log
            .contains(&"After Capability Filter ([text_input, image_input]): 1".to_owned())
    );
}

#[tokio::test]
/// # Panics
/// Panics if the selected candidate also appears among the alternatives.
async fn test_alternatives_never_repeat_selection() {
    let candidates: Vec<Candidate> = (0..6)
        .map(|index| Candidate::new(format!("model-{index}")).with_score(f64::from(index % 3)))
        .collect();
    let (selector, _breaker) = selector_over(candidates);

    for strategy in Strategy::ALL {
        let request =
            SelectionRequest::new("user-1", Category::Text).with_strategy(strategy.as_str());
        let result = selector.select_model(&request).await.expect("selection");
        let selected = result.selected_model.id();
        assert!(
            result.alternatives.iter().all(|model| model.id() != selected),
            "{strategy} repeated {selected}"
        );
    }
}

#[tokio::test]
/// # Panics
/// Panics if a free usage mode does not drive the free strategy.
async fn test_free_usage_mode_from_preferences() {
    let candidates = vec![
        Candidate::new("claude-3-opus").with_score(1300.0),
        Candidate::new("llama-3.1-8b").with_source("groq").with_score(1100.0),
        Candidate::new("gemini-1.5-flash").with_score(1150.0),
    ];
    let (selector, _breaker) = selector_over(candidates);
    let preferences = InMemoryPreferences::default().with_user(
        "user-1",
        UserPreferences {
            usage_mode: Some("free".to_owned()),
            global_strategy: Some("performance".to_owned()),
            ..UserPreferences::default()
        },
    );
    let selector = selector.with_preferences(Arc::new(preferences));

    let result = selector
        .select_model(&SelectionRequest::new("user-1", Category::Text))
        .await
        .expect("selection");
    assert_eq!(result.strategy_used, Strategy::Free);
    assert_eq!(result.selected_model.id(), "gemini-1.5-flash");
    assert_eq!(result.selected_model.provider, "gemini");
    assert_eq!(result.alternatives.len(), 1);
    assert_eq!(result.alternatives[0].provider, "groq");
}

#[test]
/// # Panics
/// Panics if filters and strategies misbehave on empty input.
fn test_empty_inputs() {
    let required = BTreeSet::from([Capability::TextInput]);
    assert!(filter_by_capabilities(&[], &required).is_empty());
    assert_eq!(
        filter_by_capabilities(&scenario_catalog(), &BTreeSet::new()),
        scenario_catalog()
    );

    let ranking = RankingStrategies::default();
    for strategy in Strategy::ALL {
        assert!(ranking.apply_strategy(&[], strategy).is_empty());
    }
}

#[test]
/// # Panics
/// Panics if the free strategy returns a premium model.
fn test_free_never_returns_premium_keywords() {
    let names = [
        "gemini-ultra",
        "gemini-1.5-flash",
        "claude-3-opus",
        "llama-3.1-405b-large",
        "qwen-max",
        "mixtral-8x7b",
        "gpt-4o-mini",
        "gemma-2-9b",
    ];
    let candidates: Vec<Candidate> = names
        .iter()
        .map(|name| Candidate::new(*name).with_source("groq"))
        .collect();

    let ranked = RankingStrategies::default().apply_strategy(&candidates, Strategy::Free);
    assert!(!ranked.is_empty());
    for candidate in ranked {
        let name = candidate.search_name();
        for keyword in ["ultra", "opus", "large", "max"] {
            assert!(!name.contains(keyword), "{name} matched {keyword}");
        }
    }
}

#[tokio::test]
/// # Panics
/// Panics if a premium-only catalog is served under the free strategy without a notice.
async fn test_free_without_free_models_reports_performance() {
    init_tracing();
    let (selector, _breaker) = selector_over(vec![
        Candidate::new("claude-3-opus").with_score(1300.0),
        Candidate::new("gemini-ultra").with_score(1280.0),
    ]);
    let request = SelectionRequest::new("user-1", Category::Text).with_strategy("free");

    let result = selector
        .select_model(&request)
        .await
        .expect("selection should degrade, not fail");

    assert_eq!(result.selected_model.id(), "claude-3-opus");
    assert_eq!(result.alternatives.len(), 1);
    assert_eq!(result.strategy_used, Strategy::Performance);
    assert_eq!(result.notices, vec![FREE_UNAVAILABLE_NOTICE]);
    assert!(
        result
            .decision_log
            .iter()
            .any(|line| line == "Strategy free matched no candidates, ranking by performance")
    );
}
