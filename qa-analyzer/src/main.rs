use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use qa_analyzer::collector::collect_files;
use qa_analyzer::planner::PlannerLimits;
use qa_analyzer::render;
use qa_analyzer::store::{DiscardStore, OutcomeStore, YamlOutcomeStore};
use qa_analyzer::{PipelineSession, SessionOptions};
use qa_analyzer_sdk::cost::ModelRates;
use qa_analyzer_sdk::request::{
    AnalysisConfig, AnalysisRequest, OutputFormat, ProviderConfig,
};
use qa_analyzer_sdk::state::{AnalysisStatus, ProgressState};
use qa_analyzer_sdk::wire;
use textgen_client::{backend_for, Provider};

/// Generate QA artifacts (user stories, test cases, acceptance criteria)
/// from source code via a text-generation backend.
#[derive(Parser, Debug)]
#[command(name = "qa-analyzer", version)]
struct Args {
    /// Source files or directories to analyze, in order
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Write the merged document to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Text-generation provider: claude | local-model
    #[arg(long, default_value = "claude")]
    provider: String,

    /// Model identifier passed to the backend
    #[arg(long)]
    model: Option<String>,

    /// API key for cloud providers (default: QA_ANALYZER_API_KEY or
    /// ANTHROPIC_API_KEY from the environment / .env)
    #[arg(long)]
    api_key: Option<String>,

    /// Base URL of a local model server (local-model provider)
    #[arg(long, default_value = "http://localhost:11434")]
    endpoint: String,

    /// Additional context prepended to every prompt
    #[arg(long)]
    context: Option<String>,

    /// Output format: markdown | gherkin | plain
    #[arg(long, default_value = "markdown")]
    format: String,

    /// Target test framework, e.g. pytest, junit
    #[arg(long)]
    framework: Option<String>,

    /// Skip user stories
    #[arg(long)]
    no_stories: bool,

    /// Skip test cases
    #[arg(long)]
    no_tests: bool,

    /// Skip acceptance criteria
    #[arg(long)]
    no_criteria: bool,

    /// Also request edge cases
    #[arg(long)]
    edge_cases: bool,

    /// Also request security test cases
    #[arg(long)]
    security_tests: bool,

    /// Total bytes at or under which a single backend call is used
    #[arg(long)]
    single_pass_limit: Option<usize>,

    /// Byte cap per batch
    #[arg(long)]
    max_batch_bytes: Option<usize>,

    /// File-count cap per batch
    #[arg(long)]
    max_batch_files: Option<usize>,

    /// Hard timeout per backend call, in seconds
    #[arg(long, default_value_t = 120)]
    call_timeout_secs: u64,

    /// Billing rate in USD per million input tokens
    #[arg(long)]
    input_rate: Option<f64>,

    /// Billing rate in USD per million output tokens
    #[arg(long)]
    output_rate: Option<f64>,

    /// Emit raw newline-delimited JSON events instead of console rendering
    #[arg(long)]
    ndjson: bool,

    /// Persist the outcome as a YAML artifact under this directory
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    run(args).await
}

async fn run(args: Args) -> Result<()> {
    let provider: Provider = args
        .provider
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let output_format: OutputFormat = args
        .format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let credential = match provider {
        Provider::Claude => args
            .api_key
            .clone()
            .or_else(|| std::env::var("QA_ANALYZER_API_KEY").ok())
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .context("no API key: pass --api-key or set QA_ANALYZER_API_KEY")?,
        Provider::LocalModel => args.endpoint.clone(),
    };

    let model = args.model.clone().unwrap_or_else(|| match provider {
        Provider::Claude => "claude-3-5-sonnet-latest".to_string(),
        Provider::LocalModel => "llama3".to_string(),
    });

    // Default rates per provider; both overridable from the command line.
    let default_rates = match provider {
        Provider::Claude => ModelRates::new(3.0, 15.0),
        Provider::LocalModel => ModelRates::free(),
    };
    let rates = ModelRates::new(
        args.input_rate.unwrap_or(default_rates.input_per_mtok),
        args.output_rate.unwrap_or(default_rates.output_per_mtok),
    );

    let defaults = PlannerLimits::default();
    let limits = PlannerLimits {
        single_pass_limit: args.single_pass_limit.unwrap_or(defaults.single_pass_limit),
        max_batch_bytes: args.max_batch_bytes.unwrap_or(defaults.max_batch_bytes),
        max_batch_files: args.max_batch_files.unwrap_or(defaults.max_batch_files),
    };

    let files = collect_files(&args.paths).await?;

    let request = AnalysisRequest {
        files,
        config: AnalysisConfig {
            want_user_stories: !args.no_stories,
            want_test_cases: !args.no_tests,
            want_acceptance_criteria: !args.no_criteria,
            want_edge_cases: args.edge_cases,
            want_security_tests: args.security_tests,
            output_format,
            test_framework: args.framework.clone(),
            additional_context: args.context.clone(),
            model: model.clone(),
        },
        provider: ProviderConfig {
            provider,
            credential: credential.clone(),
        },
    };

    let backend = backend_for(
        provider,
        credential,
        Duration::from_secs(args.call_timeout_secs),
    );
    let store: Arc<dyn OutcomeStore> = match &args.artifacts_dir {
        Some(dir) => Arc::new(YamlOutcomeStore::new(dir.clone())),
        None => Arc::new(DiscardStore),
    };

    let mut session = PipelineSession::start(
        request,
        backend,
        SessionOptions {
            limits,
            rates,
            store,
        },
    )?;

    // Ctrl-C requests cooperative cancellation; the pipeline emits a single
    // `cancelled` marker and the loop below drains it.
    let cancel = session.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let mut state = ProgressState::new();
    state.connected();
    let mut stdout = tokio::io::stdout();

    while let Some(event) = session.next_event().await {
        if args.ndjson {
            wire::write_event(&mut stdout, &event).await?;
        } else {
            println!("{}", render::describe(&event));
        }
        state.apply(&event);
    }

    match state.status {
        AnalysisStatus::Complete => {
            if let (Some(path), Some(sections)) = (&args.output, &state.sections) {
                tokio::fs::write(path, render::merged_document(sections))
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;
                if !args.ndjson {
                    println!("\x1b[32m✓ Saved: {}\x1b[0m", path.display());
                }
            }
            Ok(())
        }
        AnalysisStatus::Cancelled => Ok(()),
        _ => {
            let reason = state
                .last_error
                .unwrap_or_else(|| "analysis did not complete".to_string());
            bail!(reason)
        }
    }
}
