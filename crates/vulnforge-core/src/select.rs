use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::policy::{ModelComparisonResult, ModelMetrics, PolicyDocument};

/// Blend between quality and speed when picking the winner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SelectionWeights {
    pub quality: f64,
    pub speed: f64,
}

impl Default for SelectionWeights {
    fn default() -> Self {
        Self {
            quality: 0.7,
            speed: 0.3,
        }
    }
}

/// Speed score (0–100) rewarding lower response time relative to the slower
/// of the two calls. The slower call scores 0; both score 100 when the
/// slower time is zero.
fn speed_score(response_time_secs: f64, slower_secs: f64) -> f64 {
    if slower_secs <= 0.0 {
        return 100.0;
    }
    (100.0 * (1.0 - response_time_secs / slower_secs)).clamp(0.0, 100.0)
}

/// Pick the winning document from the dual-model pair.
///
/// `overall = quality_weight * quality + speed_weight * speed`; ties break
/// in favor of the higher raw quality score. Deterministic for fixed
/// `(quality_score, response_time)` pairs.
pub fn select_winner(
    first: &PolicyDocument,
    second: &PolicyDocument,
    weights: &SelectionWeights,
) -> ModelComparisonResult {
    let slower = first.response_time_secs.max(second.response_time_secs);

    let composite = |doc: &PolicyDocument| {
        weights.quality * doc.quality_score
            + weights.speed * speed_score(doc.response_time_secs, slower)
    };
    let first_overall = composite(first);
    let second_overall = composite(second);

    let winner = if first_overall > second_overall {
        first
    } else if second_overall > first_overall {
        second
    } else if first.quality_score >= second.quality_score {
        first
    } else {
        second
    };

    let mut per_model_metrics = BTreeMap::new();
    for doc in [first, second] {
        per_model_metrics.insert(
            doc.model_id.clone(),
            ModelMetrics {
                quality_score: doc.quality_score,
                response_time_secs: doc.response_time_secs,
                policy_count: doc.policies.len(),
                recommendation_count: doc.recommendations.len(),
            },
        );
    }

    let rationale = format!(
        "{} wins: composite {:.1} vs {:.1} (quality {:.1} vs {:.1}, \
         response time {:.1}s vs {:.1}s)",
        winner.model_id,
        first_overall.max(second_overall),
        first_overall.min(second_overall),
        first.quality_score,
        second.quality_score,
        first.response_time_secs,
        second.response_time_secs,
    );
    info!(winner = %winner.model_id, %rationale, "selected winning policy document");

    ModelComparisonResult {
        per_model_metrics,
        winner: winner.model_id.clone(),
        rationale,
    }
}
