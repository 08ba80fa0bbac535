use serde::{Deserialize, Serialize};

use crate::engine::InvokerConfig;
use crate::evaluate::QualityWeights;
use crate::normalize::NormalizeConfig;
use crate::prompt::PromptConfig;
use crate::risk::{RiskThresholds, RiskWeights};
use crate::select::SelectionWeights;

/// Explicit pipeline context: every tunable the stages consume, passed
/// through call sites instead of living in process-wide state.
///
/// The severity weights and the quality/speed blend are policy defaults,
/// not load-bearing constants; only monotonicity and determinism are
/// contractual.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub risk_weights: RiskWeights,
    pub risk_thresholds: RiskThresholds,
    pub prompt: PromptConfig,
    pub quality: QualityWeights,
    pub selection: SelectionWeights,
    pub invoker: InvokerConfig,
}

impl PipelineConfig {
    pub fn normalize_config(&self) -> NormalizeConfig {
        NormalizeConfig {
            weights: self.risk_weights,
            thresholds: self.risk_thresholds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.risk_weights.critical, 10);
        assert_eq!(config.risk_weights.high, 5);
        assert_eq!(config.risk_thresholds.critical, 80);
        assert_eq!(config.prompt.max_findings, 50);
        assert!((config.selection.quality - 0.7).abs() < f64::EPSILON);
        assert!((config.quality.relevance - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_toml_overrides_merge_with_defaults() {
        let parsed: PipelineConfig = serde_json::from_str(
            r#"{"prompt": {"max_findings": 10, "max_packages": 5},
                "selection": {"quality": 0.6, "speed": 0.4}}"#,
        )
        .unwrap();
        assert_eq!(parsed.prompt.max_findings, 10);
        assert!((parsed.selection.speed - 0.4).abs() < f64::EPSILON);
        // Untouched sections keep their defaults.
        assert_eq!(parsed.risk_weights.critical, 10);
    }
}
