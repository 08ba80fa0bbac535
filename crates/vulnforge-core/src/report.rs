use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::finding::NormalizedDataset;
use crate::policy::{ModelComparisonResult, PolicyDocument};

/// Format styles for the CLI-facing summary.
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Writes the pipeline's output artifacts verbatim. This stage performs no
/// business logic; a write failure is the only fatal error class.
pub struct ReportWriter {
    out_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Write every artifact: the normalized dataset, each model's raw
    /// document, the comparison record, and the winner as the canonical
    /// policy artifact.
    pub fn write_all(
        &self,
        dataset: &NormalizedDataset,
        documents: &[PolicyDocument],
        comparison: &ModelComparisonResult,
        winner: &PolicyDocument,
    ) -> Result<()> {
        fs::create_dir_all(&self.out_dir).with_context(|| {
            format!("failed to create output directory {}", self.out_dir.display())
        })?;

        self.write_json("normalized-dataset.json", dataset)?;
        for document in documents {
            let name = format!("policy-{}.json", sanitize_model_id(&document.model_id));
            self.write_json(&name, document)?;
        }
        self.write_json("model-comparison.json", comparison)?;
        self.write_json("security-policies.json", winner)?;
        info!(out_dir = %self.out_dir.display(), "wrote report artifacts");
        Ok(())
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.out_dir.join(name);
        let body = serde_json::to_string_pretty(value)?;
        fs::write(&path, body)
            .with_context(|| format!("failed to write artifact {}", path.display()))
    }
}

/// Model ids contain `/` (e.g. `deepseek/deepseek-r1`); flatten for use in
/// filenames.
fn sanitize_model_id(model_id: &str) -> String {
    model_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Render a dataset summary for the CLI.
pub fn render_summary(dataset: &NormalizedDataset, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(dataset)?),
        OutputFormat::Human => render_human(dataset),
    }
}

fn render_human(dataset: &NormalizedDataset) -> Result<String> {
    let metrics = &dataset.risk_metrics;
    let mut out = String::new();
    writeln!(
        out,
        "Risk Score: {} ({:?})",
        metrics.risk_score, metrics.risk_level
    )?;
    writeln!(out, "Total Findings: {}", metrics.total)?;
    writeln!(
        out,
        "  Critical: {}  High: {}  Medium: {}  Low: {}  Info: {}",
        metrics.critical, metrics.high, metrics.medium, metrics.low, metrics.info
    )?;

    if !dataset.by_tool.is_empty() {
        writeln!(out, "\nFindings by tool:")?;
        for (tool, count) in &dataset.by_tool {
            writeln!(out, "  - {tool:<18} {count}")?;
        }
    }
    if !dataset.by_category.is_empty() {
        writeln!(out, "\nFindings by category:")?;
        for (category, count) in &dataset.by_category {
            writeln!(out, "  - {category:<18} {count}")?;
        }
    }
    if !dataset.warnings.is_empty() {
        writeln!(out, "\nWarnings:")?;
        for warning in &dataset.warnings {
            writeln!(out, "  - [{}] {}", warning.tool, warning.message)?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::ParseWarning;
    use crate::policy::GenerationMethod;
    use std::collections::BTreeMap;

    fn sample_document(model_id: &str) -> PolicyDocument {
        PolicyDocument {
            model_id: model_id.into(),
            generation_method: GenerationMethod::Fallback,
            quality_score: 42.0,
            response_time_secs: 1.5,
            policies: crate::policy::fallback_payload(
                &crate::finding::RiskMetrics::empty(),
                &BTreeMap::new(),
            )
            .policies,
            recommendations: vec!["r".into()],
        }
    }

    fn sample_comparison() -> ModelComparisonResult {
        ModelComparisonResult {
            per_model_metrics: BTreeMap::new(),
            winner: "a/one".into(),
            rationale: "a/one wins".into(),
        }
    }

    #[test]
    fn writes_all_artifacts() {
        let temp = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(temp.path());
        let dataset = NormalizedDataset::empty();
        let docs = vec![sample_document("a/one"), sample_document("b/two")];

        writer
            .write_all(&dataset, &docs, &sample_comparison(), &docs[0])
            .unwrap();

        for name in [
            "normalized-dataset.json",
            "policy-a_one.json",
            "policy-b_two.json",
            "model-comparison.json",
            "security-policies.json",
        ] {
            assert!(temp.path().join(name).exists(), "missing {name}");
        }

        let winner: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(temp.path().join("security-policies.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(winner["generation_method"], "fallback");
        assert!(winner["policies"].as_array().unwrap().len() > 0);
    }

    #[test]
    fn sanitizes_model_ids_for_filenames() {
        assert_eq!(
            sanitize_model_id("deepseek/deepseek-r1"),
            "deepseek_deepseek-r1"
        );
        assert_eq!(sanitize_model_id("a:b c"), "a_b_c");
    }

    #[test]
    fn human_summary_lists_counts_and_warnings() {
        let mut dataset = NormalizedDataset::empty();
        dataset.by_tool.insert("trivy".into(), 3);
        dataset.warnings.push(ParseWarning {
            tool: "zap".into(),
            message: "malformed report".into(),
        });
        let output = render_summary(&dataset, OutputFormat::Human).unwrap();
        assert!(output.contains("Risk Score"));
        assert!(output.contains("trivy"));
        assert!(output.contains("malformed report"));
    }

    #[test]
    fn json_summary_round_trips() {
        let dataset = NormalizedDataset::empty();
        let output = render_summary(&dataset, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["risk_metrics"]["total"], 0);
    }
}
