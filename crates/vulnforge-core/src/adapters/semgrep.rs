use serde::Deserialize;
use tracing::warn;

use super::{AdapterOutput, FormatAdapter};
use crate::finding::{Finding, Severity};

/// Adapter for semgrep static-analysis reports (`results[]`).
///
/// Semgrep's native scale is ERROR/WARNING/INFO; it maps losslessly in rank
/// order onto HIGH/MEDIUM/INFO.
pub struct SemgrepAdapter;

const TOOL: &str = "semgrep";

#[derive(Deserialize)]
struct SemgrepReport {
    #[serde(default)]
    results: Vec<SemgrepResult>,
}

#[derive(Deserialize)]
struct SemgrepResult {
    #[serde(default)]
    check_id: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    start: Option<Position>,
    #[serde(default)]
    extra: Extra,
}

#[derive(Deserialize)]
struct Position {
    #[serde(default)]
    line: Option<u64>,
}

#[derive(Deserialize, Default)]
struct Extra {
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Deserialize, Default)]
struct Metadata {
    #[serde(default)]
    cwe: Vec<String>,
    #[serde(default)]
    references: Vec<String>,
    #[serde(default)]
    fix: Option<String>,
}

fn map_severity(raw: Option<&str>) -> Severity {
    match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
        Some("ERROR") => Severity::High,
        Some("WARNING") => Severity::Medium,
        // Some rulesets emit the canonical labels directly.
        Some(other) => Severity::from_native(other),
        None => Severity::Info,
    }
}

impl FormatAdapter for SemgrepAdapter {
    fn tool(&self) -> &'static str {
        TOOL
    }

    fn parse(&self, raw: &str) -> AdapterOutput {
        let report: SemgrepReport = match serde_json::from_str(raw) {
            Ok(report) => report,
            Err(err) => {
                warn!(tool = TOOL, %err, "failed to parse report");
                return AdapterOutput::warning(TOOL, format!("malformed report: {err}"));
            }
        };

        let findings = report
            .results
            .into_iter()
            .map(|result| {
                let check_id = result
                    .check_id
                    .unwrap_or_else(|| "SEMGREP-UNKNOWN".into());
                let message = result
                    .extra
                    .message
                    .unwrap_or_else(|| "Static analysis finding".into());
                Finding {
                    id: check_id,
                    tool: TOOL.into(),
                    severity: map_severity(result.extra.severity.as_deref()),
                    category: "static-analysis".into(),
                    cwe: result.extra.metadata.cwe,
                    cvss_score: None,
                    title: message.clone(),
                    description: message,
                    package: None,
                    file: result.path,
                    line: result.start.and_then(|p| p.line),
                    remediation: result.extra.metadata.fix,
                    references: result.extra.metadata.references,
                }
            })
            .collect();

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
        "results": [
            {
                "check_id": "python.lang.security.eval-use",
                "path": "app/main.py",
                "start": {"line": 42},
                "extra": {
                    "severity": "ERROR",
                    "message": "Use of eval() detected",
                    "metadata": {
                        "cwe": ["CWE-95"],
                        "references": ["https://owasp.example/eval"],
                        "fix": "Replace eval with ast.literal_eval"
                    }
                }
            },
            {
                "check_id": "python.flask.debug-enabled",
                "path": "app/main.py",
                "start": {"line": 7},
                "extra": {"severity": "WARNING", "message": "Flask debug mode"}
            }
        ]
    }"#;

    #[test]
    fn maps_native_scale_in_rank_order() {
        let output = SemgrepAdapter.parse(REPORT);
        assert_eq!(output.findings.len(), 2);
        assert_eq!(output.findings[0].severity, Severity::High);
        assert_eq!(output.findings[1].severity, Severity::Medium);
    }

    #[test]
    fn carries_rule_metadata_through() {
        let output = SemgrepAdapter.parse(REPORT);
        let finding = &output.findings[0];
        assert_eq!(finding.id, "python.lang.security.eval-use");
        assert_eq!(finding.cwe, vec!["CWE-95".to_string()]);
        assert_eq!(finding.line, Some(42));
        assert_eq!(
            finding.remediation.as_deref(),
            Some("Replace eval with ast.literal_eval")
        );
    }

    #[test]
    fn missing_severity_defaults_to_info() {
        let output = SemgrepAdapter.parse(
            r#"{"results": [{"check_id": "x", "path": "a.py", "extra": {"message": "m"}}]}"#,
        );
        assert_eq!(output.findings[0].severity, Severity::Info);
    }

    #[test]
    fn empty_results_is_a_valid_report() {
        let output = SemgrepAdapter.parse(r#"{"results": []}"#);
        assert!(output.findings.is_empty());
        assert!(output.warnings.is_empty());
    }
}
