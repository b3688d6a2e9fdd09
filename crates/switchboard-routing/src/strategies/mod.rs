//! Ranking strategies.
//!
//! Every strategy is a stable descending sort over a score derived from the
//! candidate, so ties keep catalog order. `free` additionally drops
//! candidates that have no free tier.

/// Cost and speed heuristics.
pub mod cost_model;

pub use cost_model::{CostModel, KeywordCostModel};

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use switchboard_core::Candidate;

/// Score used when a candidate has no quality score in cost-benefit ranking.
const DEFAULT_COST_BENEFIT_SCORE: f64 = 1000.0;

/// Ranking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Quality score, highest first.
    #[default]
    Performance,
    /// Quality score divided by estimated cost.
    CostBenefit,
    /// Estimated speed.
    Speed,
    /// Alias of speed.
    Cheapest,
    /// Free-tier models only.
    Free,
}

impl Strategy {
    /// Every strategy, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Performance,
        Self::CostBenefit,
        Self::Speed,
        Self::Cheapest,
        Self::Free,
    ];

    /// Snake case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Performance => "performance",
            Self::CostBenefit => "cost_benefit",
            Self::Speed => "speed",
            Self::Cheapest => "cheapest",
            Self::Free => "free",
        }
    }

    /// Parses a name, falling back to performance when it is unknown.
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "performance" => Ok(Self::Performance),
            "cost_benefit" => Ok(Self::CostBenefit),
            "speed" => Ok(Self::Speed),
            "cheapest" => Ok(Self::Cheapest),
            "free" => Ok(Self::Free),
            other => Err(format!("unknown strategy: {other}")),
        }
    }
}

/// Applies ranking strategies using a pluggable cost model.
#[derive(Clone)]
pub struct RankingStrategies {
    /// Heuristics behind cost-benefit, speed and free ranking.
    cost_model: Arc<dyn CostModel>,
}

impl Default for RankingStrategies {
    fn default() -> Self {
        Self::new(Arc::new(KeywordCostModel))
    }
}

impl RankingStrategies {
    /// Ranking backed by `cost_model`.
    pub fn new(cost_model: Arc<dyn CostModel>) -> Self {
        Self { cost_model }
    }

    /// Orders `candidates` by `strategy`.
    pub fn apply_strategy(&self, candidates: &[Candidate], strategy: Strategy) -> Vec<Candidate> {
        match strategy {
            Strategy::Performance => rank_by(candidates, |candidate| {
                Some(candidate.score.unwrap_or(0.0))
            }),
            Strategy::CostBenefit => rank_by(candidates, |candidate| {
                let base = candidate.score.unwrap_or(DEFAULT_COST_BENEFIT_SCORE);
                Some(base / self.cost_model.cost_multiplier(candidate))
            }),
            Strategy::Speed | Strategy::Cheapest => rank_by(candidates, |candidate| {
                Some(self.cost_model.speed_score(candidate))
            }),
            Strategy::Free => rank_by(candidates, |candidate| self.cost_model.free_score(candidate)),
        }
    }

    /// Orders `candidates` by the strategy called `name`; unknown names rank by performance.
    pub fn apply_named(&self, candidates: &[Candidate], name: &str) -> Vec<Candidate> {
        self.apply_strategy(candidates, Strategy::parse_or_default(name))
    }
}

/// Stable descending sort by `score`, dropping candidates scored `None`.
fn rank_by<F>(candidates: &[Candidate], score: F) -> Vec<Candidate>
where
    F: Fn(&Candidate) -> Option<f64>,
{
    let mut scored: Vec<(f64, &Candidate)> = candidates
        .iter()
        .filter_map(|candidate| score(candidate).map(|value| (value, candidate)))
        .collect();
    scored.sort_by(|(left, _), (right, _)| right.total_cmp(left));
    scored
        .into_iter()
        .map(|(_, candidate)| candidate.clone())
        .collect()
}
