mod display;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{Value, json};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use sceneline_classify::{
    EscalationThresholds, GuardRemedy, GuardThresholds, build_review_request, run_guarded,
    run_pipeline, score_blocks,
};
use sceneline_core::{
    ClassifierRole, MergePolicy, ScreenplayBlock, ScreenplayDocument, StructurePipelinePolicy,
};
use sceneline_review::{ReviewCoordinator, ReviewerConfig, apply_decisions};

/// Exit status for a review request that failed validation.
const EXIT_INVALID_REQUEST: u8 = 2;

#[derive(Parser)]
#[command(name = "sceneline", version, about = "Arabic screenplay structure classification and review")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify raw screenplay text into typed blocks.
    Classify(ClassifyArgs),
    /// Classify and score, printing the review request for escalated lines.
    Score(ScoreArgs),
    /// Send a review request to the decision service.
    Review(ReviewArgs),
    /// Classify, score, review and apply decisions.
    Run(RunArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
    Markup,
}

#[derive(Args)]
struct PipelineArgs {
    /// Input file, or `-` for stdin.
    input: PathBuf,

    #[arg(long, default_value = "none")]
    merge_policy: MergePolicy,

    /// Canonicalise whitespace and cue punctuation while classifying.
    #[arg(long)]
    rewrite: bool,
}

impl PipelineArgs {
    fn policy(&self) -> StructurePipelinePolicy {
        let role = if self.rewrite {
            ClassifierRole::LimitedRewrite
        } else {
            ClassifierRole::LabelOnly
        };
        StructurePipelinePolicy::new(self.merge_policy, role)
    }
}

#[derive(Args)]
struct ClassifyArgs {
    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Blocks currently on screen (document JSON or a bare block array).
    #[arg(long)]
    current: Option<PathBuf>,

    /// On guard rejection, fall back to one action block per line.
    #[arg(long)]
    fallback: bool,

    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,
}

#[derive(Args)]
struct ScoreArgs {
    #[command(flatten)]
    pipeline: PipelineArgs,

    #[command(flatten)]
    escalation: EscalationArgs,

    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[derive(Args)]
struct EscalationArgs {
    /// Session id for the review request (default: time based).
    #[arg(long)]
    session: Option<String>,

    /// Neighbouring blocks sent with each escalated line.
    #[arg(long, default_value_t = 2)]
    context: usize,
}

#[derive(Args)]
struct ReviewArgs {
    /// Review request JSON file, or `-` for stdin.
    request: PathBuf,

    #[command(flatten)]
    reviewer: ReviewerArgs,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    pipeline: PipelineArgs,

    #[command(flatten)]
    escalation: EscalationArgs,

    #[command(flatten)]
    reviewer: ReviewerArgs,

    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,
}

#[derive(Args)]
struct ReviewerArgs {
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "SCENELINE_REVIEW_MODEL")]
    model: Option<String>,

    #[arg(long, env = "SCENELINE_REVIEW_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "SCENELINE_REVIEW_FALLBACK_URL")]
    fallback_url: Option<String>,

    #[arg(long, env = "SCENELINE_REVIEW_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

impl ReviewerArgs {
    fn config(&self) -> ReviewerConfig {
        let mut config = ReviewerConfig::new(self.api_key.clone());
        if let Some(model) = &self.model {
            config = config.with_model(model);
        }
        if let Some(base) = &self.base_url {
            config = config.with_base_url(base).with_fallback_url(base);
        }
        if let Some(fallback) = &self.fallback_url {
            config = config.with_fallback_url(fallback);
        }
        if let Some(secs) = self.timeout_secs.filter(|s| *s > 0) {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "command failed");
            for cause in err.chain().skip(1) {
                error!(cause = %cause, "caused by");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    info!("sceneline v{}", env!("CARGO_PKG_VERSION"));
    match cli.command {
        Commands::Classify(args) => cmd_classify(args),
        Commands::Score(args) => cmd_score(args),
        Commands::Review(args) => cmd_review(args).await,
        Commands::Run(args) => cmd_run(args).await,
    }
}

// ── Commands ──

fn cmd_classify(args: ClassifyArgs) -> anyhow::Result<ExitCode> {
    let raw = read_input(&args.pipeline.input)?;
    let current = match &args.current {
        Some(path) => Some(read_blocks(path)?),
        None => None,
    };
    let remedy = if args.fallback {
        GuardRemedy::LineFallback
    } else {
        GuardRemedy::KeepCurrent
    };

    let run = run_guarded(
        &raw,
        args.pipeline.policy(),
        current.as_deref(),
        remedy,
        &GuardThresholds::default(),
    );

    // A held run leaves the current document in place.
    let shown: &[ScreenplayBlock] = match (run.committed_blocks(), current.as_deref()) {
        (Some(blocks), _) => blocks,
        (None, Some(current)) => current,
        (None, None) => &[],
    };
    if !run.report.accepted {
        warn!(reasons = ?run.report.reasons, fallback = run.report.fallback_applied, "projection guard rejected output");
    }

    match args.format {
        OutputFormat::Json => print_json(&json!({
            "policy": run.result.policy,
            "report": run.report,
            "merges": run.result.merges.declared_merges(),
            "blocks": shown,
        }))?,
        OutputFormat::Table => {
            display::print_guard_report(&run.report);
            display::print_blocks(shown);
        }
        OutputFormat::Markup => println!("{}", ScreenplayDocument::new(shown.to_vec()).to_markup()),
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_score(args: ScoreArgs) -> anyhow::Result<ExitCode> {
    let raw = read_input(&args.pipeline.input)?;
    let result = run_pipeline(&raw, args.pipeline.policy());
    let assessments = score_blocks(&result.blocks, &EscalationThresholds::default());

    match args.format {
        OutputFormat::Table => display::print_assessments(&result.blocks, &assessments),
        OutputFormat::Json | OutputFormat::Markup => {
            let request = build_review_request(
                &args.escalation.session_id(),
                &result.blocks,
                &assessments,
                args.escalation.context,
            );
            print_json(&request)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_review(args: ReviewArgs) -> anyhow::Result<ExitCode> {
    let raw = read_input(&args.request)?;
    let body: Value = serde_json::from_str(&raw).context("review request is not valid JSON")?;
    let coordinator = ReviewCoordinator::from_config(args.reviewer.config())
        .context("failed to build review transport")?;

    match coordinator.review_value(&body).await {
        Ok(response) => {
            print_json(&response)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            warn!(reason = err.reason(), "review request rejected");
            print_json(&err.body())?;
            Ok(ExitCode::from(EXIT_INVALID_REQUEST))
        }
    }
}

async fn cmd_run(args: RunArgs) -> anyhow::Result<ExitCode> {
    let raw = read_input(&args.pipeline.input)?;
    let result = run_pipeline(&raw, args.pipeline.policy());
    let assessments = score_blocks(&result.blocks, &EscalationThresholds::default());
    let request = build_review_request(
        &args.escalation.session_id(),
        &result.blocks,
        &assessments,
        args.escalation.context,
    );

    let coordinator = ReviewCoordinator::from_config(args.reviewer.config())
        .context("failed to build review transport")?;
    let response = coordinator.review(&request).await;
    let blocks = apply_decisions(&result.blocks, &request, &response);

    match args.format {
        OutputFormat::Json => print_json(&json!({
            "review": response,
            "blocks": blocks,
        }))?,
        OutputFormat::Table => {
            display::print_review_summary(&response);
            display::print_blocks(&blocks);
        }
        OutputFormat::Markup => println!("{}", ScreenplayDocument::new(blocks).to_markup()),
    }
    Ok(ExitCode::SUCCESS)
}

// ── Helpers ──

impl EscalationArgs {
    fn session_id(&self) -> String {
        self.session
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().format("cli-%Y%m%dT%H%M%S").to_string())
    }
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_blocks(path: &Path) -> anyhow::Result<Vec<ScreenplayBlock>> {
    let raw = read_input(path)?;
    parse_blocks(&raw).with_context(|| format!("{} is not a block list or document", path.display()))
}

/// Accepts a bare block array or a versioned document.
fn parse_blocks(raw: &str) -> anyhow::Result<Vec<ScreenplayBlock>> {
    if let Ok(blocks) = serde_json::from_str::<Vec<ScreenplayBlock>>(raw) {
        return Ok(blocks);
    }
    Ok(ScreenplayDocument::from_json(raw)?.blocks)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
