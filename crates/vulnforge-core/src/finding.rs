use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical five-level severity scale shared by every adapter.
///
/// Ordered so that `CRITICAL` is maximal; deduplication relies on `Ord` to
/// keep the more severe of two duplicate findings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Map a scanner-native severity label onto the canonical scale.
    ///
    /// Unrecognized or absent values map to `INFO` rather than being dropped.
    pub fn from_native(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Self::Critical,
            "HIGH" => Self::High,
            "MEDIUM" | "MODERATE" => Self::Medium,
            "LOW" => Self::Low,
            _ => Self::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Info => "INFO",
        }
    }
}

/// One normalized vulnerability/observation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// CVE id, rule id, or tool-assigned id; not unique across tools.
    pub id: String,
    /// Originating adapter name (e.g. `trivy`).
    pub tool: String,
    pub severity: Severity,
    /// Coarse classification: secrets, static-analysis, dependency,
    /// container, dynamic.
    pub category: String,
    #[serde(default)]
    pub cwe: Vec<String>,
    #[serde(default)]
    pub cvss_score: Option<f64>,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u64>,
    #[serde(default)]
    pub remediation: Option<String>,
    #[serde(default)]
    pub references: Vec<String>,
}

impl Finding {
    /// Package if present, otherwise file; the unit deduplication keys on.
    pub fn location(&self) -> Option<&str> {
        self.package.as_deref().or(self.file.as_deref())
    }

    /// Validate field invariants after parsing.
    pub fn validate(&self) -> Result<(), FindingValidationError> {
        if self.id.trim().is_empty() {
            return Err(FindingValidationError::EmptyId {
                tool: self.tool.clone(),
            });
        }
        if let Some(score) = self.cvss_score {
            if !(0.0..=10.0).contains(&score) {
                return Err(FindingValidationError::InvalidCvss {
                    id: self.id.clone(),
                    score,
                });
            }
        }
        Ok(())
    }
}

/// Validation errors for findings emitted by adapters.
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingValidationError {
    #[error("finding from `{tool}` has a blank id")]
    EmptyId { tool: String },
    #[error("finding `{id}` CVSS score must be within 0.0..=10.0 (got {score})")]
    InvalidCvss { id: String, score: f64 },
}

/// Structured record of an adapter-level failure that was absorbed rather
/// than propagated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub tool: String,
    pub message: String,
}

/// Risk tier derived from the aggregate weighted score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Aggregate counts and the derived risk score/level for a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
    pub risk_score: u64,
    pub risk_level: RiskLevel,
}

impl RiskMetrics {
    /// An all-zero metrics block for empty input.
    pub fn empty() -> Self {
        Self {
            total: 0,
            critical: 0,
            high: 0,
            medium: 0,
            low: 0,
            info: 0,
            risk_score: 0,
            risk_level: RiskLevel::Low,
        }
    }
}

/// Canonical output of the normalization stage: deduplicated findings plus
/// aggregate metrics and provenance counts.
///
/// `risk_metrics.total == findings.len()` holds by construction; the metrics
/// are recomputed from the final findings vector, never patched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedDataset {
    pub findings: Vec<Finding>,
    pub risk_metrics: RiskMetrics,
    /// Pre-dedup counts per tool, so provenance stays auditable.
    pub by_tool: BTreeMap<String, usize>,
    /// Pre-dedup counts per category.
    pub by_category: BTreeMap<String, usize>,
    #[serde(default)]
    pub warnings: Vec<ParseWarning>,
}

impl NormalizedDataset {
    /// Valid empty dataset: all metrics zero, no findings.
    pub fn empty() -> Self {
        Self {
            findings: Vec::new(),
            risk_metrics: RiskMetrics::empty(),
            by_tool: BTreeMap::new(),
            by_category: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }
}
