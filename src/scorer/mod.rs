//! Per-service latency anomaly scoring. `Scorer` is a trait so the threshold
//! reference implementation can later be swapped for a statistical model
//! without touching the registry or the dataflow around it.

use dashmap::DashMap;

/// Scores a span duration in milliseconds to a value in [0, 1].
pub trait Scorer: Send + Sync {
    fn score(&self, duration_ms: f64) -> f64;
}

/// Reference scorer: a hard threshold at 500ms.
#[derive(Debug, Default)]
pub struct ThresholdScorer;

impl Scorer for ThresholdScorer {
    fn score(&self, duration_ms: f64) -> f64 {
        if duration_ms > 500.0 {
            0.95
        } else {
            0.05
        }
    }
}

/// A span is anomalous iff its score exceeds this.
pub const ANOMALY_THRESHOLD: f64 = 0.5;

/// Lazily registers one scorer per service on first observation, grounded
/// on the registry's `entry().or_insert_with()` idiom for per-key state.
pub struct ScorerRegistry {
    scorers: DashMap<String, Box<dyn Scorer>>,
}

impl ScorerRegistry {
    pub fn new() -> Self {
        Self {
            scorers: DashMap::new(),
        }
    }

    /// Score a span duration for the given service, registering a new
    /// `ThresholdScorer` the first time this service is seen.
    pub fn score(&self, service_name: &str, duration_ms: f64) -> (f64, bool) {
        let score = self
            .scorers
            .entry(service_name.to_string())
            .or_insert_with(|| Box::new(ThresholdScorer))
            .score(duration_ms);
        (score, score > ANOMALY_THRESHOLD)
    }
}

impl Default for ScorerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_over_500ms_score_above_half_and_are_anomalous() {
        let registry = ScorerRegistry::new();
        let (score, is_anomaly) = registry.score("quote", 1500.0);
        assert!(score > 0.5);
        assert!(is_anomaly);
    }

    #[test]
    fn spans_at_or_under_500ms_score_at_or_below_half_and_are_not_anomalous() {
        let registry = ScorerRegistry::new();
        let (score, is_anomaly) = registry.score("quote", 100.0);
        assert!(score <= 0.5);
        assert!(!is_anomaly);
    }

    #[test]
    fn registers_distinct_state_per_service() {
        let registry = ScorerRegistry::new();
        registry.score("quote", 100.0);
        registry.score("cart", 1500.0);
        assert_eq!(registry.scorers.len(), 2);
    }
}
