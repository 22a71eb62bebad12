//! CLI command definitions for swe-mend.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use crate::llm::ChatClient;
use crate::orchestrator::{OrchestratorConfig, TaskOrchestrator};

/// Default model for the agent backend.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default base URL of the task source.
const DEFAULT_SOURCE_BASE: &str = "http://localhost:8081/task/index";

/// Default base URL of the verification harness.
const DEFAULT_HARNESS_BASE: &str = "http://localhost:8082";

/// Default base URL of the OpenAI-compatible chat API.
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Automated repair-and-verify pipeline for benchmark repair tasks.
#[derive(Parser)]
#[command(name = "swe-mend")]
#[command(about = "Fetch repair tasks, run a bounded fixing agent, and verify against a test harness")]
#[command(version)]
#[command(
    long_about = "swe-mend drives an automated repair loop: fetch a problem descriptor, clone the target repository at the pinned revision, let a bounded tool-using agent edit the code, submit the result to the verification harness, and append the per-task outcome to the result log.\n\nExample usage:\n  swe-mend run --from 1 --to 10 --model gpt-4o-mini"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the pipeline over an inclusive range of task indices.
    Run(RunArgs),
}

/// Arguments for `swe-mend run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// First task index to attempt.
    #[arg(long, default_value = "1")]
    pub from: u32,

    /// Last task index to attempt (inclusive).
    #[arg(long, default_value = "1")]
    pub to: u32,

    /// Base URL of the task source; tasks are fetched from `{base}/{index}`.
    #[arg(long, default_value = DEFAULT_SOURCE_BASE)]
    pub source_base: String,

    /// Base URL of the verification harness.
    #[arg(long, default_value = DEFAULT_HARNESS_BASE)]
    pub harness_base: String,

    /// Local directory where working repositories are cloned.
    #[arg(long, default_value = "./repos")]
    pub repos_dir: PathBuf,

    /// Repository root as seen by the harness's own filesystem.
    #[arg(long, default_value = "/repos")]
    pub harness_repo_root: String,

    /// Append-only result log file.
    #[arg(long, default_value = "results.log")]
    pub log_file: PathBuf,

    /// Model to use for the agent backend.
    #[arg(short = 'm', long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Maximum agent turns per task.
    #[arg(long, default_value = "30")]
    pub max_turns: usize,

    /// Base URL of the OpenAI-compatible chat API.
    #[arg(long, default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// API key for the agent backend (can also be set via OPENAI_API_KEY).
    #[arg(long, env = "OPENAI_API_KEY")]
    pub api_key: Option<String>,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse arguments and dispatch.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Dispatch an already-parsed CLI invocation.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_pipeline(args).await,
    }
}

/// Execute the `run` subcommand.
async fn run_pipeline(args: RunArgs) -> anyhow::Result<()> {
    if args.to < args.from {
        anyhow::bail!(
            "Invalid index range: --to ({}) is less than --from ({})",
            args.to,
            args.from
        );
    }

    let llm = Arc::new(ChatClient::new(
        args.api_base.clone(),
        args.api_key.clone(),
        args.model.clone(),
    ));

    let config = OrchestratorConfig {
        source_base: args.source_base,
        harness_base: args.harness_base,
        repos_dir: args.repos_dir,
        harness_repo_root: args.harness_repo_root,
        log_file: args.log_file,
        model: args.model,
        max_turns: args.max_turns,
    };

    info!(
        from = args.from,
        to = args.to,
        model = %config.model,
        "Starting repair run"
    );

    let orchestrator = TaskOrchestrator::new(config, llm);
    let summary = orchestrator.run_range(args.from, args.to).await?;

    info!(
        attempted = summary.attempted,
        solved = summary.solved,
        failed = summary.failed,
        "Repair run finished"
    );
    Ok(())
}
