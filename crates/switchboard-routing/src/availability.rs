//! Breaker-backed availability filtering.

use std::sync::Arc;
use switchboard_core::Candidate;

use crate::breaker::CircuitBreaker;

/// Removes candidates whose circuit is open.
#[derive(Debug, Clone)]
pub struct AvailabilityService {
    /// Shared breaker consulted for every candidate.
    breaker: Arc<CircuitBreaker>,
}

impl AvailabilityService {
    /// Wraps a shared breaker.
    pub fn new(breaker: Arc<CircuitBreaker>) -> Self {
        Self { breaker }
    }

    /// Candidates whose circuit allows calls, in their original order.
    pub fn filter_available(&self, candidates: &[Candidate]) -> Vec<Candidate> {
        candidates
            .iter()
            .filter(|candidate| self.breaker.is_available(&candidate.id))
            .cloned()
            .collect()
    }

    /// Whether a single model may be called.
    pub fn is_available(&self, model_id: &str) -> bool {
        self.breaker.is_available(model_id)
    }

    /// Underlying breaker.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::FailureReason;

    #[test]
    fn test_filter_keeps_order_and_drops_open() {
        let breaker = Arc::new(CircuitBreaker::default());
        breaker.record_failure("b", Some(FailureReason::QuotaExceeded));
        let service = AvailabilityService::new(Arc::clone(&breaker));

        let candidates = vec![Candidate::new("a"), Candidate::new("b"), Candidate::new("c")];
        let ids: Vec<String> = service
            .filter_available(&candidates)
            .into_iter()
            .map(|candidate| candidate.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);

        let again = service.filter_available(&candidates);
        assert_eq!(again.len(), 2);
        assert!(!service.is_available("b"));
    }
}
