use serde::Deserialize;
use tracing::warn;

use super::{AdapterOutput, FormatAdapter};
use crate::finding::{Finding, Severity};

/// Adapter for gitleaks secret-detection reports.
///
/// Gitleaks emits either a top-level array of leaks or `{"findings": [...]}`.
/// Every detected secret is treated as `CRITICAL`: a leaked credential is
/// exploitable regardless of where it sits.
pub struct GitleaksAdapter;

const TOOL: &str = "gitleaks";

#[derive(Deserialize)]
#[serde(untagged)]
enum GitleaksReport {
    Flat(Vec<Leak>),
    Wrapped { findings: Vec<Leak> },
}

#[derive(Deserialize)]
struct Leak {
    #[serde(rename = "RuleID", default)]
    rule_id: Option<String>,
    #[serde(rename = "Description", default)]
    description: Option<String>,
    #[serde(rename = "Match", default)]
    match_text: Option<String>,
    #[serde(rename = "File", default)]
    file: Option<String>,
    #[serde(rename = "StartLine", default)]
    start_line: Option<u64>,
    #[serde(rename = "Commit", default)]
    commit: Option<String>,
}

impl FormatAdapter for GitleaksAdapter {
    fn tool(&self) -> &'static str {
        TOOL
    }

    fn parse(&self, raw: &str) -> AdapterOutput {
        let report: GitleaksReport = match serde_json::from_str(raw) {
            Ok(report) => report,
            Err(err) => {
                warn!(tool = TOOL, %err, "failed to parse report");
                return AdapterOutput::warning(TOOL, format!("malformed report: {err}"));
            }
        };
        let leaks = match report {
            GitleaksReport::Flat(leaks) => leaks,
            GitleaksReport::Wrapped { findings } => findings,
        };

        let findings = leaks
            .into_iter()
            .map(|leak| {
                let rule = leak.rule_id.unwrap_or_else(|| "unknown".into());
                let anchor = leak
                    .commit
                    .clone()
                    .or_else(|| leak.file.clone())
                    .unwrap_or_else(|| "unknown".into());
                let prefix: String = anchor.chars().take(8).collect();
                Finding {
                    id: format!("GITLEAKS-{prefix}"),
                    tool: TOOL.into(),
                    severity: Severity::Critical,
                    category: "secrets".into(),
                    cwe: vec!["CWE-798".into()],
                    cvss_score: None,
                    title: format!("Secret detected: {rule}"),
                    description: leak
                        .description
                        .or(leak.match_text)
                        .unwrap_or_else(|| "Secret found in repository".into()),
                    package: None,
                    file: leak.file,
                    line: leak.start_line,
                    remediation: Some(
                        "Remove the secret from version control and rotate the credential."
                            .into(),
                    ),
                    references: Vec::new(),
                }
            })
            .collect();

        AdapterOutput {
            findings,
            warnings: Vec::new(),
        }
    }
}
