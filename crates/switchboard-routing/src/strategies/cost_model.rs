//! Name-keyword pricing heuristics.
//!
//! These stand in for real per-token pricing. They live behind [`CostModel`]
//! so a pricing table can replace them without touching the ranking code.

use switchboard_core::Candidate;

/// Relative cost and speed estimates used by the ranking strategies.
pub trait CostModel: Send + Sync {
    /// Multiplier applied to the quality score by the cost-benefit strategy.
    fn cost_multiplier(&self, candidate: &Candidate) -> f64;

    /// Speed estimate; higher is faster.
    fn speed_score(&self, candidate: &Candidate) -> f64;

    /// Free-tier preference, or `None` when the candidate is not usable for free.
    fn free_score(&self, candidate: &Candidate) -> Option<f64>;
}

/// Flagship keywords that triple the estimated cost.
const FLAGSHIP_KEYWORDS: [&str; 3] = ["ultra", "opus", "gpt-4"];
/// Mid-range keywords.
const MID_RANGE_KEYWORDS: [&str; 2] = ["pro", "sonnet"];
/// Budget keywords that halve the estimated cost.
const BUDGET_KEYWORDS: [&str; 3] = ["flash", "haiku", "mini"];
/// Premium keywords never offered on free usage.
const PREMIUM_KEYWORDS: [&str; 4] = ["ultra", "opus", "large", "max"];
/// Open-weight families with free hosted tiers.
const OPEN_WEIGHT_FAMILIES: [&str; 3] = ["llama", "gemma", "mixtral"];

/// Whether `keyword` appears in `name` at the start of a token.
///
/// The match must also end the token, except that trailing digits are allowed
/// (`llama` matches `llama3`) and a keyword ending in a digit may be followed
/// by a variant suffix (`gpt-4` matches `gpt-4o`).
fn has_keyword(name: &str, keyword: &str) -> bool {
    let open_ended = keyword.ends_with(|ch: char| ch.is_ascii_digit());
    name.match_indices(keyword).any(|(start, _)| {
        let starts_token = name[..start]
            .chars()
            .next_back()
            .is_none_or(|ch| !ch.is_ascii_alphanumeric());
        let ends_token = open_ended
            || name[start + keyword.len()..]
                .chars()
                .next()
                .is_none_or(|ch| !ch.is_ascii_alphabetic());
        starts_token && ends_token
    })
}

/// Whether `name` contains any of `keywords` as a token.
fn contains_any(name: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| has_keyword(name, keyword))
}

/// Keyword heuristics over the lowercased id and display name, matched per token.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordCostModel;

impl CostModel for KeywordCostModel {
    fn cost_multiplier(&self, candidate: &Candidate) -> f64 {
        let name = candidate.search_name();
        if contains_any(&name, &FLAGSHIP_KEYWORDS) {
            3.0
        } else if contains_any(&name, &MID_RANGE_KEYWORDS) {
            1.5
        } else if contains_any(&name, &BUDGET_KEYWORDS) {
            0.5
        } else {
            1.0
        }
    }

    fn speed_score(&self, candidate: &Candidate) -> f64 {
        let name = candidate.search_name();
        if has_keyword(&name, "flash") || candidate.source_lower() == "groq" {
            100.0
        } else if has_keyword(&name, "haiku") || has_keyword(&name, "mini") {
            80.0
        } else if has_keyword(&name, "pro") || has_keyword(&name, "turbo") {
            50.0
        } else {
            10.0
        }
    }

    fn free_score(&self, candidate: &Candidate) -> Option<f64> {
        let name = candidate.search_name();
        if contains_any(&name, &PREMIUM_KEYWORDS) {
            return None;
        }

        if has_keyword(&name, "gemini") && has_keyword(&name, "flash") {
            Some(100.0)
        } else if has_keyword(&name, "gemini") && has_keyword(&name, "pro") {
            Some(80.0)
        } else if contains_any(&name, &OPEN_WEIGHT_FAMILIES) {
            if candidate.source_lower() == "groq" {
                Some(60.0)
            } else {
                Some(10.0)
            }
        } else if has_keyword(&name, "mini") || has_keyword(&name, "haiku") {
            Some(50.0)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_multiplier_tiers() {
        let model = KeywordCostModel;
        assert!((model.cost_multiplier(&Candidate::new("claude-3-opus")) - 3.0).abs() < f64::EPSILON);
        assert!((model.cost_multiplier(&Candidate::new("gpt-4o")) - 3.0).abs() < f64::EPSILON);
        assert!((model.cost_multiplier(&Candidate::new("gemini-1.5-pro")) - 1.5).abs() < f64::EPSILON);
        assert!((model.cost_multiplier(&Candidate::new("gemini-1.5-flash")) - 0.5).abs() < f64::EPSILON);
        assert!((model.cost_multiplier(&Candidate::new("qwen-72b")) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_speed_prefers_flash_and_groq() {
        let model = KeywordCostModel;
        let hosted = Candidate::new("llama-3.1-70b").with_source("Groq");
        assert!((model.speed_score(&hosted) - 100.0).abs() < f64::EPSILON);
        assert!((model.speed_score(&Candidate::new("claude-3-haiku")) - 80.0).abs() < f64::EPSILON);
        assert!((model.speed_score(&Candidate::new("gpt-3.5-turbo")) - 50.0).abs() < f64::EPSILON);
        assert!((model.speed_score(&Candidate::new("qwen-72b")) - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_free_score() {
        let model = KeywordCostModel;
        assert_eq!(model.free_score(&Candidate::new("gemini-1.5-flash")), Some(100.0));
        assert_eq!(model.free_score(&Candidate::new("gemini-1.5-pro")), Some(80.0));
        assert_eq!(
            model.free_score(&Candidate::new("llama3-8b").with_source("groq")),
            Some(60.0)
        );
        assert_eq!(model.free_score(&Candidate::new("gemma-7b")), Some(10.0));
        assert_eq!(model.free_score(&Candidate::new("gpt-4o-mini")), Some(50.0));
        assert_eq!(model.free_score(&Candidate::new("claude-3-5-sonnet")), None);
    }

    #[test]
    fn test_premium_keywords_are_never_free() {
        let model = KeywordCostModel;
        assert_eq!(model.free_score(&Candidate::new("gemini-ultra")), None);
        assert_eq!(model.free_score(&Candidate::new("llama-3.1-405b-large")), None);
        assert_eq!(model.free_score(&Candidate::new("claude-3-opus")), None);
        assert_eq!(
            model.free_score(&Candidate::new("qwen-max").with_display_name("Qwen Max")),
            None
        );
    }

    #[test]
    fn test_keywords_match_whole_tokens() {
        assert!(has_keyword("gemini-1.5-pro", "pro"));
        assert!(has_keyword("llama3-8b", "llama"));
        assert!(has_keyword("gpt-4o-mini", "gpt-4"));
        assert!(has_keyword("qwen max", "max"));
        assert!(!has_keyword("gemini-1.0", "mini"));
        assert!(!has_keyword("prompt-guard-86m", "pro"));
        assert!(!has_keyword("llama-maximus", "max"));

        let model = KeywordCostModel;
        assert!((model.speed_score(&Candidate::new("gemini-1.0")) - 10.0).abs() < f64::EPSILON);
        assert!((model.cost_multiplier(&Candidate::new("prompt-guard-86m")) - 1.0).abs() < f64::EPSILON);
        assert_eq!(
            model.free_score(&Candidate::new("llama-maximus").with_source("groq")),
            Some(60.0)
        );
    }
}
