use std::collections::{BTreeMap, HashMap};

use tracing::{debug, instrument};

use crate::adapters::AdapterOutput;
use crate::finding::{
    Finding, FindingValidationError, NormalizedDataset, ParseWarning, RiskLevel, RiskMetrics,
    Severity,
};
use crate::risk::{level_for, weighted_score, RiskThresholds, RiskWeights};

/// Tuning knobs for normalization and scoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeConfig {
    pub weights: RiskWeights,
    pub thresholds: RiskThresholds,
}

/// Two findings describe the same observation when they share a comparable
/// id and a location, or, failing a comparable id, the same title/file/line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DedupKey {
    ById {
        id: String,
        location: String,
    },
    ByLocation {
        title: String,
        file: Option<String>,
        line: Option<u64>,
    },
}

impl DedupKey {
    fn for_finding(finding: &Finding) -> Self {
        if id_is_comparable(finding) {
            Self::ById {
                id: finding.id.to_lowercase(),
                location: finding
                    .location()
                    .unwrap_or_default()
                    .to_lowercase(),
            }
        } else {
            Self::ByLocation {
                title: finding.title.clone(),
                file: finding.file.clone(),
                line: finding.line,
            }
        }
    }
}

/// Tool-synthesized ids (`GITLEAKS-…`, `ZAP-…`) are anchors, not shared
/// vocabulary, so they are not comparable across findings.
fn id_is_comparable(finding: &Finding) -> bool {
    let id = finding.id.trim();
    if id.is_empty() {
        return false;
    }
    let synthetic_prefix = format!("{}-", finding.tool.to_uppercase());
    !id.to_uppercase().starts_with(&synthetic_prefix)
}

/// Merge adapter outputs into one canonical dataset.
///
/// Never fails: empty input yields a valid all-zero dataset. Duplicate
/// findings keep the higher-rank severity and the position of their first
/// occurrence. `by_tool`/`by_category` count the pre-dedup attribution;
/// `risk_metrics` is computed from the deduplicated set.
#[instrument(skip_all, fields(batches = outputs.len()))]
pub fn normalize(outputs: Vec<AdapterOutput>, config: &NormalizeConfig) -> NormalizedDataset {
    let mut warnings = Vec::new();
    let mut raw_findings = Vec::new();
    for output in outputs {
        warnings.extend(output.warnings);
        raw_findings.extend(output.findings);
    }

    // Validation failures are absorbed: the offending field is defaulted and
    // the finding kept, mirroring the adapters' warning semantics.
    for finding in &mut raw_findings {
        if let Err(err) = finding.validate() {
            warnings.push(ParseWarning {
                tool: finding.tool.clone(),
                message: err.to_string(),
            });
            match err {
                // Synthetic anchor; non-comparable, so dedup falls back to
                // title/file/line for these.
                FindingValidationError::EmptyId { .. } => {
                    finding.id = format!("{}-UNKNOWN", finding.tool.to_uppercase());
                }
                FindingValidationError::InvalidCvss { .. } => finding.cvss_score = None,
            }
        }
    }

    let mut by_tool: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
    for finding in &raw_findings {
        *by_tool.entry(finding.tool.clone()).or_default() += 1;
        *by_category.entry(finding.category.clone()).or_default() += 1;
    }

    let before = raw_findings.len();
    let findings = deduplicate(raw_findings);
    debug!(
        before,
        after = findings.len(),
        "deduplicated findings"
    );

    let risk_metrics = compute_metrics(&findings, config);
    debug_assert_eq!(risk_metrics.total, findings.len());

    NormalizedDataset {
        findings,
        risk_metrics,
        by_tool,
        by_category,
        warnings,
    }
}

fn deduplicate(raw: Vec<Finding>) -> Vec<Finding> {
    let mut slots: HashMap<DedupKey, usize> = HashMap::new();
    let mut kept: Vec<Finding> = Vec::with_capacity(raw.len());

    for finding in raw {
        let key = DedupKey::for_finding(&finding);
        match slots.get(&key) {
            Some(&idx) => {
                // Never silently drop the more severe signal.
                if finding.severity > kept[idx].severity {
                    kept[idx] = finding;
                }
            }
            None => {
                slots.insert(key, kept.len());
                kept.push(finding);
            }
        }
    }
    kept
}

fn compute_metrics(findings: &[Finding], config: &NormalizeConfig) -> RiskMetrics {
    let mut metrics = RiskMetrics {
        total: findings.len(),
        critical: 0,
        high: 0,
        medium: 0,
        low: 0,
        info: 0,
        risk_score: 0,
        risk_level: RiskLevel::Low,
    };
    for finding in findings {
        match finding.severity {
            Severity::Critical => metrics.critical += 1,
            Severity::High => metrics.high += 1,
            Severity::Medium => metrics.medium += 1,
            Severity::Low => metrics.low += 1,
            Severity::Info => metrics.info += 1,
        }
    }
    metrics.risk_score = weighted_score(&metrics, &config.weights);
    metrics.risk_level = level_for(metrics.risk_score, &config.thresholds);
    metrics
}
