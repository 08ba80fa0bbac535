use serde::Deserialize;
use tracing::warn;

use super::{AdapterOutput, FormatAdapter};
use crate::finding::{Finding, Severity};

/// Adapter for trivy container-image scan reports
/// (`Results[].Vulnerabilities[]`).
pub struct TrivyAdapter;

const TOOL: &str = "trivy";

#[derive(Deserialize)]
struct TrivyReport {
    #[serde(rename = "Results", default)]
    results: Vec<TrivyResult>,
}

#[derive(Deserialize)]
struct TrivyResult {
    #[serde(rename = "Target", default)]
    target: Option<String>,
    #[serde(rename = "Vulnerabilities", default)]
    vulnerabilities: Vec<TrivyVuln>,
}

#[derive(Deserialize)]
struct TrivyVuln {
    #[serde(rename = "VulnerabilityID", default)]
    id: Option<String>,
    #[serde(rename = "PkgName", default)]
    pkg_name: Option<String>,
    #[serde(rename = "InstalledVersion", default)]
    installed_version: Option<String>,
    #[serde(rename = "FixedVersion", default)]
    fixed_version: Option<String>,
    #[serde(rename = "Severity", default)]
    severity: Option<String>,
    #[serde(rename = "Title", default)]
    title: Option<String>,
    #[serde(rename = "Description", default)]
    description: Option<String>,
    #[serde(rename = "CVSS", default)]
    cvss: Option<Cvss>,
    #[serde(rename = "References", default)]
    references: Vec<String>,
}

#[derive(Deserialize)]
struct Cvss {
    #[serde(default)]
    nvd: Option<CvssSource>,
}

#[derive(Deserialize)]
struct CvssSource {
    #[serde(rename = "V3Score", default)]
    v3_score: Option<f64>,
}

impl FormatAdapter for TrivyAdapter {
    fn tool(&self) -> &'static str {
        TOOL
    }

    fn parse(&self, raw: &str) -> AdapterOutput {
        let report: TrivyReport = match serde_json::from_str(raw) {
            Ok(report) => report,
            Err(err) => {
                warn!(tool = TOOL, %err, "failed to parse report");
                return AdapterOutput::warning(TOOL, format!("malformed report: {err}"));
            }
        };

        let mut findings = Vec::new();
        for result in report.results {
            let target = result.target.unwrap_or_else(|| "unknown".into());
            for vuln in result.vulnerabilities {
                let id = vuln.id.unwrap_or_else(|| "TRIVY-UNKNOWN".into());
                let package = vuln.pkg_name.unwrap_or_else(|| "unknown".into());
                let remediation = match (&vuln.installed_version, &vuln.fixed_version) {
                    (Some(installed), Some(fixed)) => {
                        format!("Update {package} from {installed} to {fixed}")
                    }
                    (_, Some(fixed)) => format!("Update {package} to {fixed}"),
                    _ => format!("Update {package} to a patched version"),
                };
                findings.push(Finding {
                    id: id.clone(),
                    tool: TOOL.into(),
                    severity: Severity::from_native(vuln.severity.as_deref().unwrap_or("")),
                    category: "container".into(),
                    cwe: Vec::new(),
                    cvss_score: vuln
                        .cvss
                        .as_ref()
                        .and_then(|c| c.nvd.as_ref())
                        .and_then(|n| n.v3_score),
                    title: vuln
                        .title
                        .unwrap_or_else(|| format!("{id} in {package}")),
                    description: vuln
                        .description
                        .unwrap_or_else(|| format!("Vulnerability in {target}")),
                    package: Some(package),
                    file: None,
                    line: None,
                    remediation: Some(remediation),
                    references: vuln.references,
                });
            }
        }

        AdapterOutput {
            findings,
            warnings: Vec::new(),
        }
    }
}
