use serde::Deserialize;
use tracing::warn;

use super::{AdapterOutput, FormatAdapter};
use crate::finding::{Finding, Severity};

/// Adapter for OWASP ZAP dynamic-testing reports (`site[].alerts[]`).
///
/// ZAP encodes severity as `riskdesc`, e.g. `"High (Medium)"`; the first
/// word is the risk rating, the parenthesized part is confidence.
pub struct ZapAdapter;

const TOOL: &str = "zap";

#[derive(Deserialize)]
struct ZapReport {
    #[serde(default)]
    site: Vec<Site>,
}

#[derive(Deserialize)]
struct Site {
    #[serde(default)]
    alerts: Vec<Alert>,
}

#[derive(Deserialize)]
struct Alert {
    #[serde(rename = "pluginid", default)]
    plugin_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "riskdesc", default)]
    risk_desc: Option<String>,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    solution: Option<String>,
    #[serde(rename = "cweid", default)]
    cwe_id: Option<String>,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    instances: Vec<Instance>,
}

#[derive(Deserialize)]
struct Instance {
    #[serde(default)]
    uri: Option<String>,
}

impl FormatAdapter for ZapAdapter {
    fn tool(&self) -> &'static str {
        TOOL
    }

    fn parse(&self, raw: &str) -> AdapterOutput {
        let report: ZapReport = match serde_json::from_str(raw) {
            Ok(report) => report,
            Err(err) => {
                warn!(tool = TOOL, %err, "failed to parse report");
                return AdapterOutput::warning(TOOL, format!("malformed report: {err}"));
            }
        };

        let mut findings = Vec::new();
        for site in report.site {
            for alert in site.alerts {
                let risk_word = alert
                    .risk_desc
                    .as_deref()
                    .and_then(|desc| desc.split_whitespace().next())
                    .unwrap_or("");
                let uri = alert.instances.first().and_then(|i| i.uri.clone());
                findings.push(Finding {
                    id: format!(
                        "ZAP-{}",
                        alert.plugin_id.as_deref().unwrap_or("UNKNOWN")
                    ),
                    tool: TOOL.into(),
                    severity: Severity::from_native(risk_word),
                    category: "dynamic".into(),
                    cwe: alert
                        .cwe_id
                        .into_iter()
                        .map(|id| format!("CWE-{id}"))
                        .collect(),
                    cvss_score: None,
                    title: alert
                        .name
                        .unwrap_or_else(|| "Web application vulnerability".into()),
                    description: alert
                        .desc
                        .unwrap_or_else(|| "Web application vulnerability".into()),
                    package: None,
                    file: uri,
                    line: None,
                    remediation: alert.solution,
                    references: alert
                        .reference
                        .map(|refs| {
                            refs.lines()
                                .map(str::trim)
                                .filter(|line| !line.is_empty())
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default(),
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
        "site": [
            {
                "alerts": [
                    {
                        "pluginid": "10038",
                        "name": "Content Security Policy Header Not Set",
                        "riskdesc": "Medium (High)",
                        "desc": "CSP header missing",
                        "solution": "Set a Content-Security-Policy header",
                        "cweid": "693",
                        "reference": "https://owasp.example/csp\nhttps://mdn.example/csp",
                        "instances": [{"uri": "https://app.example/login"}]
                    },
                    {
                        "pluginid": "10021",
                        "name": "X-Content-Type-Options Missing",
                        "riskdesc": "Low (Medium)"
                    }
                ]
            }
        ]
    }"#;

    #[test]
    fn severity_comes_from_first_word_of_riskdesc() {
        let output = ZapAdapter.parse(REPORT);
        assert_eq!(output.findings.len(), 2);
        assert_eq!(output.findings[0].severity, Severity::Medium);
        assert_eq!(output.findings[1].severity, Severity::Low);
    }

    #[test]
    fn alert_fields_map_to_finding() {
        let output = ZapAdapter.parse(REPORT);
        let finding = &output.findings[0];
        assert_eq!(finding.id, "ZAP-10038");
        assert_eq!(finding.cwe, vec!["CWE-693".to_string()]);
        assert_eq!(finding.file.as_deref(), Some("https://app.example/login"));
        assert_eq!(finding.references.len(), 2);
    }

    #[test]
    fn empty_site_list_yields_empty_output() {
        let output = ZapAdapter.parse(r#"{"site": []}"#);
        assert!(output.findings.is_empty());
        assert!(output.warnings.is_empty());
    }
}
