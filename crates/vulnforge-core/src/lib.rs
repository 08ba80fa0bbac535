pub mod adapters;
pub mod config;
pub mod engine;
pub mod evaluate;
pub mod finding;
pub mod llm;
pub mod normalize;
pub mod policy;
pub mod prompt;
pub mod report;
pub mod risk;
pub mod select;

pub use adapters::{adapter_for, registry, AdapterOutput, FormatAdapter};
pub use config::PipelineConfig;
pub use engine::{generate_policy_pair, InvokerConfig};
pub use evaluate::{evaluate, QualityBreakdown, QualityWeights};
pub use finding::{
    Finding, FindingValidationError, NormalizedDataset, ParseWarning, RiskLevel, RiskMetrics,
    Severity,
};
pub use llm::{ModelCallError, ModelClient, ModelSettings, NoopModelClient, OpenRouterClient};
pub use normalize::{normalize, NormalizeConfig};
pub use policy::{
    extract_policy_payload, fallback_document, GenerationMethod, ModelComparisonResult,
    ModelMetrics, Policy, PolicyDocument,
};
pub use prompt::{render_prompt, AnalysisRequest, PromptConfig};
pub use report::{render_summary, OutputFormat, ReportWriter};
pub use risk::{RiskThresholds, RiskWeights};
pub use select::{select_winner, SelectionWeights};
