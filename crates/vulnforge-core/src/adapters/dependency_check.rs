use serde::Deserialize;
use tracing::warn;

use super::{AdapterOutput, FormatAdapter};
use crate::finding::{Finding, Severity};

/// Adapter for OWASP Dependency-Check SCA reports
/// (`dependencies[].vulnerabilities[]`).
pub struct DependencyCheckAdapter;

const TOOL: &str = "dependency-check";

#[derive(Deserialize)]
struct DepCheckReport {
    #[serde(default)]
    dependencies: Vec<Dependency>,
}

#[derive(Deserialize)]
struct Dependency {
    #[serde(rename = "fileName", default)]
    file_name: Option<String>,
    #[serde(default)]
    vulnerabilities: Vec<DepVuln>,
}

#[derive(Deserialize)]
struct DepVuln {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    cwe: Option<String>,
    #[serde(default)]
    cvssv3: Option<CvssV3>,
    #[serde(default)]
    references: Vec<Reference>,
}

#[derive(Deserialize)]
struct CvssV3 {
    #[serde(rename = "baseScore", default)]
    base_score: Option<f64>,
}

#[derive(Deserialize)]
struct Reference {
    #[serde(default)]
    url: Option<String>,
}

impl FormatAdapter for DependencyCheckAdapter {
    fn tool(&self) -> &'static str {
        TOOL
    }

    fn parse(&self, raw: &str) -> AdapterOutput {
        let report: DepCheckReport = match serde_json::from_str(raw) {
            Ok(report) => report,
            Err(err) => {
                warn!(tool = TOOL, %err, "failed to parse report");
                return AdapterOutput::warning(TOOL, format!("malformed report: {err}"));
            }
        };

        let mut findings = Vec::new();
        for dependency in report.dependencies {
            let package = dependency.file_name.unwrap_or_else(|| "unknown".into());
            for vuln in dependency.vulnerabilities {
                let id = vuln.name.unwrap_or_else(|| "CVE-UNKNOWN".into());
                findings.push(Finding {
                    id: id.clone(),
                    tool: TOOL.into(),
                    severity: Severity::from_native(vuln.severity.as_deref().unwrap_or("")),
                    category: "dependency".into(),
                    cwe: vuln.cwe.into_iter().collect(),
                    cvss_score: vuln.cvssv3.and_then(|c| c.base_score),
                    title: format!("{id} in {package}"),
                    description: vuln
                        .description
                        .unwrap_or_else(|| "Known vulnerability in dependency".into()),
                    package: Some(package.clone()),
                    file: None,
                    line: None,
                    remediation: Some(format!("Update {package} to a patched version")),
                    references: vuln
                        .references
                        .into_iter()
                        .filter_map(|r| r.url)
                        .collect(),
                });
            }
        }

        AdapterOutput {
            findings,
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "dependencies": [
            {
                "fileName": "requests-2.25.0.whl",
                "vulnerabilities": [
                    {
                        "name": "CVE-2023-32681",
                        "severity": "MEDIUM",
                        "description": "Proxy-Authorization header leak",
                        "cwe": "CWE-200",
                        "cvssv3": {"baseScore": 6.1},
                        "references": [{"url": "https://nvd.example/CVE-2023-32681"}]
                    }
                ]
            },
            {"fileName": "clean-lib.jar"}
        ]
    }"#;

    #[test]
    fn parses_nested_vulnerabilities() {
        let output = DependencyCheckAdapter.parse(REPORT);
        assert_eq!(output.findings.len(), 1);

        let finding = &output.findings[0];
        assert_eq!(finding.id, "CVE-2023-32681");
        assert_eq!(finding.severity, Severity::Medium);
        assert_eq!(finding.package.as_deref(), Some("requests-2.25.0.whl"));
        assert_eq!(finding.cvss_score, Some(6.1));
        assert_eq!(finding.cwe, vec!["CWE-200".to_string()]);
        assert_eq!(
            finding.references,
            vec!["https://nvd.example/CVE-2023-32681".to_string()]
        );
    }

    #[test]
    fn dependencies_without_vulnerabilities_are_skipped() {
        let output = DependencyCheckAdapter.parse(REPORT);
        assert!(!output
            .findings
            .iter()
            .any(|f| f.package.as_deref() == Some("clean-lib.jar")));
    }
}
