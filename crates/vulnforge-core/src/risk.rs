use serde::{Deserialize, Serialize};

use crate::finding::{RiskLevel, RiskMetrics};

/// Per-severity weights for the aggregate risk score.
///
/// The exact values are a policy choice; the contract is monotonicity:
/// increasing any severity count never decreases the score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskWeights {
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            critical: 10,
            high: 5,
            medium: 2,
            low: 1,
        }
    }
}

/// Ascending score thresholds mapping the weighted score onto a risk tier.
///
/// Scores below `medium` are LOW; `critical` and above are CRITICAL.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 10,
            high: 30,
            critical: 80,
        }
    }
}

/// Weighted risk score over the severity counts. INFO findings carry no
/// weight.
pub fn weighted_score(metrics: &RiskMetrics, weights: &RiskWeights) -> u64 {
    weights.critical * metrics.critical as u64
        + weights.high * metrics.high as u64
        + weights.medium * metrics.medium as u64
        + weights.low * metrics.low as u64
}

/// Step function mapping a score onto its tier.
pub fn level_for(score: u64, thresholds: &RiskThresholds) -> RiskLevel {
    if score >= thresholds.critical {
        RiskLevel::Critical
    } else if score >= thresholds.high {
        RiskLevel::High
    } else if score >= thresholds.medium {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}
