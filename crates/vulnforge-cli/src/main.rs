use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vulnforge_core::{
    adapter_for, evaluate, generate_policy_pair, normalize, render_prompt, render_summary,
    select_winner, AdapterOutput, AnalysisRequest, FormatAdapter, ModelClient, ModelSettings,
    NoopModelClient, NormalizedDataset, OpenRouterClient, OutputFormat, PipelineConfig,
    PolicyDocument, QualityWeights, ReportWriter,
};

#[derive(Parser, Debug)]
#[command(
    name = "vulnforge",
    author,
    version,
    about = "Security report normalization and remediation policy generation"
)]
struct Cli {
    /// Pipeline tuning file (TOML: risk weights, thresholds, prompt caps)
    #[arg(long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse raw scanner reports into a single normalized dataset
    Normalize {
        /// Directory containing scanner reports (e.g. trivy-report.json)
        #[arg(long = "reports-dir", value_name = "DIR", default_value = "./reports")]
        reports_dir: PathBuf,

        /// Where to write the normalized dataset
        #[arg(long, value_name = "FILE", default_value = "normalized-dataset.json")]
        out: PathBuf,

        /// Emit the summary as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
    /// Generate remediation policies from a normalized dataset via two models
    GeneratePolicy {
        /// Normalized dataset produced by `normalize`
        #[arg(long, value_name = "FILE")]
        input: PathBuf,

        /// Directory for the generated artifacts
        #[arg(long = "out-dir", value_name = "DIR", default_value = "./policies")]
        out_dir: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_pipeline_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Normalize {
            reports_dir,
            out,
            json,
        } => run_normalize(&reports_dir, &out, json, &config)?,
        Commands::GeneratePolicy { input, out_dir } => {
            run_generate_policy(&input, &out_dir, &config).await?
        }
    }
    Ok(())
}

fn run_normalize(
    reports_dir: &Path,
    out: &Path,
    json: bool,
    config: &PipelineConfig,
) -> Result<()> {
    let outputs = collect_reports(reports_dir)?;
    if outputs.is_empty() {
        warn!(dir = %reports_dir.display(), "no recognized scanner reports found");
    }
    let dataset = normalize(outputs, &config.normalize_config());

    let body = serde_json::to_string_pretty(&dataset)?;
    fs::write(out, body)
        .with_context(|| format!("failed to write dataset to {}", out.display()))?;

    let format = if json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    println!("{}", render_summary(&dataset, format)?);
    Ok(())
}

/// Walk the reports directory and parse every file whose name starts with a
/// known tool prefix (`trivy-image.json`, `zap-report.json`, ...). Files for
/// tools that produced no report are simply absent; an unreadable file that
/// does exist is fatal.
fn collect_reports(reports_dir: &Path) -> Result<Vec<AdapterOutput>> {
    let entries = fs::read_dir(reports_dir)
        .with_context(|| format!("failed to read reports directory {}", reports_dir.display()))?;

    let mut outputs = Vec::new();
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
        .collect();
    paths.sort();

    for path in paths {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(adapter) = tool_for_filename(name).and_then(adapter_for) else {
            continue;
        };
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read report {}", path.display()))?;
        let output = adapter.parse(&raw);
        info!(
            tool = adapter.tool(),
            file = %path.display(),
            findings = output.findings.len(),
            warnings = output.warnings.len(),
            "parsed scanner report"
        );
        outputs.push(output);
    }
    Ok(outputs)
}

fn tool_for_filename(name: &str) -> Option<&'static str> {
    const TOOLS: [&str; 5] = ["dependency-check", "gitleaks", "semgrep", "trivy", "zap"];
    TOOLS
        .iter()
        .copied()
        .find(|tool| name.starts_with(&format!("{tool}-")) || name == format!("{tool}.json"))
}

async fn run_generate_policy(input: &Path, out_dir: &Path, config: &PipelineConfig) -> Result<()> {
    let raw = fs::read_to_string(input)
        .with_context(|| format!("failed to read dataset {}", input.display()))?;
    let dataset: NormalizedDataset = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a normalized dataset", input.display()))?;

    let settings = ModelSettings::from_env()?;
    let primary = build_client(&settings, &settings.primary_model)?;
    let secondary = build_client(&settings, &settings.secondary_model)?;

    let request = AnalysisRequest::build(&dataset, &config.prompt);
    let prompt = render_prompt(&request);
    let (mut first, mut second) = generate_policy_pair(
        &dataset,
        &prompt,
        primary.as_ref(),
        secondary.as_ref(),
        &config.invoker,
    )
    .await;

    score(&mut first, &dataset, &config.quality);
    score(&mut second, &dataset, &config.quality);

    let comparison = select_winner(&first, &second, &config.selection);
    let winner = if comparison.winner == first.model_id {
        &first
    } else {
        &second
    };

    let writer = ReportWriter::new(out_dir);
    writer.write_all(&dataset, &[first.clone(), second.clone()], &comparison, winner)?;

    println!("{}", comparison.rationale);
    println!(
        "winner: {} ({} policies, quality {:.1})",
        winner.model_id,
        winner.policies.len(),
        winner.quality_score
    );
    println!("artifacts written to {}", out_dir.display());
    Ok(())
}

fn score(document: &mut PolicyDocument, dataset: &NormalizedDataset, weights: &QualityWeights) {
    document.quality_score = evaluate(document, dataset, weights).overall;
}

fn build_client(settings: &ModelSettings, model: &str) -> Result<Box<dyn ModelClient>> {
    match settings.provider.to_lowercase().as_str() {
        "noop" => Ok(Box::new(NoopModelClient::new(model))),
        _ => Ok(Box::new(OpenRouterClient::new(settings, model)?)),
    }
}

fn load_pipeline_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .build()
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    settings
        .try_deserialize()
        .with_context(|| format!("invalid pipeline config in {}", path.display()))
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}
