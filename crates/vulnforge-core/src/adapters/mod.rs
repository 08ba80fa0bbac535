use crate::finding::{Finding, ParseWarning};

pub mod dependency_check;
pub mod gitleaks;
pub mod semgrep;
pub mod trivy;
pub mod zap;

pub use dependency_check::DependencyCheckAdapter;
pub use gitleaks::GitleaksAdapter;
pub use semgrep::SemgrepAdapter;
pub use trivy::TrivyAdapter;
pub use zap::ZapAdapter;

/// Findings plus any absorbed failures from one adapter run.
#[derive(Debug, Clone, Default)]
pub struct AdapterOutput {
    pub findings: Vec<Finding>,
    pub warnings: Vec<ParseWarning>,
}

impl AdapterOutput {
    pub fn warning(tool: &str, message: impl Into<String>) -> Self {
        Self {
            findings: Vec::new(),
            warnings: vec![ParseWarning {
                tool: tool.to_string(),
                message: message.into(),
            }],
        }
    }
}

/// Converts one scanner family's native JSON report into canonical findings.
///
/// Implementations are pure: the same raw report always yields the same
/// findings. Malformed or missing input produces an empty finding list plus
/// a `ParseWarning`, never an error that aborts the pipeline.
pub trait FormatAdapter: Send + Sync {
    /// Canonical tool name stamped onto every finding (e.g. `trivy`).
    fn tool(&self) -> &'static str;

    /// Parse a raw report body.
    fn parse(&self, raw: &str) -> AdapterOutput;
}

/// All known adapters, one per scanner family.
pub fn registry() -> Vec<Box<dyn FormatAdapter>> {
    vec![
        Box::new(GitleaksAdapter),
        Box::new(SemgrepAdapter),
        Box::new(DependencyCheckAdapter),
        Box::new(TrivyAdapter),
        Box::new(ZapAdapter),
    ]
}

/// Look up an adapter by tool name. New scanner formats plug in here without
/// touching the normalizer.
pub fn adapter_for(tool: &str) -> Option<Box<dyn FormatAdapter>> {
    registry()
        .into_iter()
        .find(|adapter| adapter.tool() == tool)
}
