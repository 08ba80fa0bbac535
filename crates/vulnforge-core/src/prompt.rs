use std::collections::BTreeMap;
use std::fmt::Write;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::finding::{NormalizedDataset, RiskMetrics, Severity};

static CVE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^CVE-\d{4}-\d+$").expect("valid CVE pattern"));

/// Bounds on the detail included in an analysis request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Cap on individual findings included in the payload.
    pub max_findings: usize,
    /// Cap on per-package rollup entries.
    pub max_packages: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_findings: 50,
            max_packages: 20,
        }
    }
}

/// Compact finding excerpt carried in the request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptFinding {
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub package: Option<String>,
    pub tool: String,
    pub category: String,
}

/// Per-package vulnerability rollup with concrete identifiers, so policy
/// generation can cite evidence instead of bare counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSummary {
    pub package: String,
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub cve_ids: Vec<String>,
}

/// Model-agnostic analysis request rendered from a normalized dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub risk_metrics: RiskMetrics,
    pub by_tool: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub findings: Vec<PromptFinding>,
    pub packages: Vec<PackageSummary>,
}

impl AnalysisRequest {
    /// Build a bounded request: every CRITICAL finding is always included,
    /// the remaining budget is filled with HIGH findings in original order.
    /// Truncation therefore can never discard a top-severity item.
    pub fn build(dataset: &NormalizedDataset, config: &PromptConfig) -> Self {
        let mut findings: Vec<PromptFinding> = dataset
            .findings
            .iter()
            .filter(|f| f.severity == Severity::Critical)
            .map(excerpt)
            .collect();
        for finding in &dataset.findings {
            if findings.len() >= config.max_findings {
                break;
            }
            if finding.severity == Severity::High {
                findings.push(excerpt(finding));
            }
        }

        let packages = package_rollup(dataset, config.max_packages);
        debug!(
            findings = findings.len(),
            packages = packages.len(),
            "built analysis request"
        );

        Self {
            risk_metrics: dataset.risk_metrics,
            by_tool: dataset.by_tool.clone(),
            by_category: dataset.by_category.clone(),
            findings,
            packages,
        }
    }
}

fn excerpt(finding: &crate::finding::Finding) -> PromptFinding {
    PromptFinding {
        id: finding.id.clone(),
        severity: finding.severity,
        title: finding.title.clone(),
        package: finding.location().map(str::to_string),
        tool: finding.tool.clone(),
        category: finding.category.clone(),
    }
}

fn package_rollup(dataset: &NormalizedDataset, cap: usize) -> Vec<PackageSummary> {
    let mut rollup: BTreeMap<String, PackageSummary> = BTreeMap::new();
    for finding in &dataset.findings {
        let Some(location) = finding.location() else {
            continue;
        };
        let entry = rollup
            .entry(location.to_string())
            .or_insert_with(|| PackageSummary {
                package: location.to_string(),
                total: 0,
                critical: 0,
                high: 0,
                cve_ids: Vec::new(),
            });
        entry.total += 1;
        match finding.severity {
            Severity::Critical => entry.critical += 1,
            Severity::High => entry.high += 1,
            _ => {}
        }
        if CVE_ID.is_match(&finding.id) {
            entry.cve_ids.push(finding.id.clone());
        }
    }

    let mut packages: Vec<_> = rollup.into_values().collect();
    packages.sort_by(|a, b| {
        (b.critical + b.high, b.total)
            .cmp(&(a.critical + a.high, a.total))
            .then_with(|| a.package.cmp(&b.package))
    });
    packages.truncate(cap);
    packages
}

/// Render the instruction text sent to both model backends.
pub fn render_prompt(request: &AnalysisRequest) -> String {
    let metrics = &request.risk_metrics;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "You are a cybersecurity expert. Based on the following vulnerability \
         scan results, generate security policies and recommendations.\n"
    );
    let _ = writeln!(out, "Vulnerability summary:");
    let _ = writeln!(out, "- Total vulnerabilities: {}", metrics.total);
    let _ = writeln!(out, "- Critical: {}", metrics.critical);
    let _ = writeln!(out, "- High: {}", metrics.high);
    let _ = writeln!(out, "- Medium: {}", metrics.medium);
    let _ = writeln!(out, "- Low: {}", metrics.low);
    let _ = writeln!(out, "- Risk score: {}", metrics.risk_score);
    let _ = writeln!(out, "- Risk level: {:?}\n", metrics.risk_level);

    let _ = writeln!(out, "Findings by tool:");
    for (tool, count) in &request.by_tool {
        let _ = writeln!(out, "- {tool}: {count}");
    }
    let _ = writeln!(out, "\nFindings by category:");
    for (category, count) in &request.by_category {
        let _ = writeln!(out, "- {category}: {count}");
    }

    if !request.packages.is_empty() {
        let _ = writeln!(out, "\nTop affected packages:");
        for pkg in &request.packages {
            let cves = if pkg.cve_ids.is_empty() {
                "n/a".to_string()
            } else {
                pkg.cve_ids
                    .iter()
                    .take(5)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let _ = writeln!(
                out,
                "- {}: {} vulnerabilities ({} critical, {} high); CVEs: {}",
                pkg.package, pkg.total, pkg.critical, pkg.high, cves
            );
        }
    }

    if !request.findings.is_empty() {
        let _ = writeln!(out, "\nMost severe findings:");
        for (idx, finding) in request.findings.iter().enumerate() {
            let _ = write!(
                out,
                "{}. [{}] {}",
                idx + 1,
                finding.severity.as_str(),
                finding.title
            );
            if let Some(package) = &finding.package {
                let _ = write!(out, " (package: {package})");
            }
            let _ = writeln!(out);
        }
    }

    let _ = writeln!(
        out,
        "\nRespond with strict JSON only:\n\
         {{\n  \"policies\": [\n    {{\"id\": \"POLICY-001\", \"title\": \"...\", \
         \"description\": \"...\", \"priority\": \"CRITICAL|HIGH|MEDIUM\", \
         \"actions\": [\"...\"], \"affected_components\": [\"...\"], \"sla\": \"...\"}}\n  ],\n\
           \"recommendations\": [\"...\"]\n}}\n\
         Generate 5-7 policies and 8-12 recommendations that are specific to the \
         vulnerabilities found, actionable, and prioritized by severity."
    );

    out
}
