//! Priority scoring.
//!
//! Every task carries a `priority_score` in [0, 100] used to rank listings.
//! The score comes from a [`PriorityScorer`]; the heuristic is always
//! available and is what the LLM scorer falls back to.

mod llm;

pub use llm::{LlmScorer, LlmScorerConfig};

use crate::config::ScorerConfig;
use crate::types::Priority;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::Arc;

/// Inputs for scoring a task.
#[derive(Debug, Clone)]
pub struct ScoreInput {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_date: Option<NaiveDateTime>,
    pub estimated_hours: Option<f64>,
    pub now: NaiveDateTime,
}

/// Source of task priority scores.
#[async_trait]
pub trait PriorityScorer: Send + Sync {
    /// Score a task in [0, 100]. Implementations never fail; they degrade
    /// to the heuristic instead.
    async fn score(&self, input: &ScoreInput) -> f64;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Deterministic weighted score.
///
/// 60% priority level, 30% due-date urgency (a logistic curve centred two
/// days out), 10% effort (saturating at 8 hours).
pub fn heuristic_priority_score(
    priority: Priority,
    due_date: Option<NaiveDateTime>,
    estimated_hours: Option<f64>,
    now: NaiveDateTime,
) -> f64 {
    let base = priority.weight();

    let due_factor = match due_date {
        Some(due) => {
            let days = (due - now).num_seconds() as f64 / 86_400.0;
            1.0 / (1.0 + (days - 2.0).exp())
        }
        None => 0.5,
    };

    let hours = match estimated_hours {
        Some(h) if h != 0.0 && h.is_finite() => h,
        _ => 1.0,
    };
    let est_factor = (hours / 8.0).min(1.0);

    let score = 100.0 * (0.6 * base + 0.3 * due_factor + 0.1 * est_factor);
    round2(score)
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Scorer backed by [`heuristic_priority_score`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicScorer;

#[async_trait]
impl PriorityScorer for HeuristicScorer {
    async fn score(&self, input: &ScoreInput) -> f64 {
        heuristic_priority_score(
            input.priority,
            input.due_date,
            input.estimated_hours,
            input.now,
        )
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

/// Pick the scorer for the given configuration: the LLM scorer when an API
/// key is configured, the heuristic otherwise.
pub fn build_scorer(config: &ScorerConfig) -> anyhow::Result<Arc<dyn PriorityScorer>> {
    match config.api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => {
            let llm_config = LlmScorerConfig::new(key, &config.model)
                .with_base_url(&config.base_url)
                .with_timeout_secs(config.timeout_secs);
            Ok(Arc::new(LlmScorer::new(llm_config)?))
        }
        None => Ok(Arc::new(HeuristicScorer)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 12)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_no_due_date_no_estimate() {
        // 0.6*0.5 + 0.3*0.5 + 0.1*(1/8) = 0.4625
        let score = heuristic_priority_score(Priority::Medium, None, None, now());
        assert_eq!(score, 46.25);
    }

    #[test]
    fn test_due_in_two_days_is_midpoint() {
        let due = now() + Duration::days(2);
        // 0.6*0.8 + 0.3*0.5 + 0.1*0.5 = 0.68
        let score = heuristic_priority_score(Priority::High, Some(due), Some(4.0), now());
        assert_eq!(score, 68.0);
    }

    #[test]
    fn test_overdue_approaches_full_urgency() {
        let overdue = now() - Duration::days(10);
        let far = now() + Duration::days(30);
        let urgent = heuristic_priority_score(Priority::Low, Some(overdue), None, now());
        let relaxed = heuristic_priority_score(Priority::Low, Some(far), None, now());
        assert!(urgent > relaxed);
        // 0.6*0.2 + 0.3*~1 + 0.1*0.125
        assert!((urgent - 43.25).abs() < 0.01);
    }

    #[test]
    fn test_estimate_saturates_and_zero_means_one_hour() {
        let big = heuristic_priority_score(Priority::Medium, None, Some(40.0), now());
        let eight = heuristic_priority_score(Priority::Medium, None, Some(8.0), now());
        assert_eq!(big, eight);

        let zero = heuristic_priority_score(Priority::Medium, None, Some(0.0), now());
        let none = heuristic_priority_score(Priority::Medium, None, None, now());
        assert_eq!(zero, none);
    }

    #[test]
    fn test_score_in_range() {
        for priority in Priority::ALL {
            for days in [-100, -1, 0, 1, 5, 100] {
                let due = now() + Duration::days(days);
                let s = heuristic_priority_score(priority, Some(due), Some(3.0), now());
                assert!((0.0..=100.0).contains(&s), "{s} out of range");
            }
        }
    }

    #[tokio::test]
    async fn test_heuristic_scorer_matches_function() {
        let input = ScoreInput {
            title: "x".to_string(),
            description: None,
            priority: Priority::High,
            due_date: None,
            estimated_hours: Some(2.0),
            now: now(),
        };
        let expected = heuristic_priority_score(Priority::High, None, Some(2.0), now());
        assert_eq!(HeuristicScorer.score(&input).await, expected);
    }

    #[test]
    fn test_build_scorer_without_key_is_heuristic() {
        let scorer = build_scorer(&ScorerConfig::default()).unwrap();
        assert_eq!(scorer.name(), "heuristic");
    }
}
