mod config;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use config::{ConfigMerger, RunOverrides};
use reviewfix_core::adapters::{FsArtifactStore, FsFindingSource};
use reviewfix_core::settings::RunSettings;
use reviewfix_core::{
    OracleBudget, OracleClient, cancel_pair, plan_artifact, run_batch, write_reports,
};
use reviewfix_types::ToolInfo;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "reviewfix",
    version,
    about = "Apply code-review findings to source files, asking an oracle for missing fixes."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Plan, resolve, apply and commit fixes for each artifact named by the findings.
    Run(RunArgs),
    /// Print the edit plan for one artifact as JSON (no oracle calls, no writes).
    Plan(PlanArgs),
}

#[derive(Debug, Parser)]
struct RunArgs {
    /// Findings file (JSON or YAML).
    #[arg(long)]
    findings: Utf8PathBuf,

    /// Artifact to repair; repeatable. Default: every file named by the findings.
    #[arg(long = "artifact")]
    artifacts: Vec<Utf8PathBuf>,

    /// Repository root; artifacts resolve against it (default: current directory).
    #[arg(long, default_value = ".")]
    repo_root: Utf8PathBuf,

    /// Config file (default: <repo_root>/reviewfix.toml when present).
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    /// Run every stage but leave artifacts untouched.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Write the JSON summaries here instead of stdout.
    #[arg(long)]
    summary_out: Option<Utf8PathBuf>,

    /// Write the combined unified diff here.
    #[arg(long)]
    patch_out: Option<Utf8PathBuf>,

    /// Oracle model id.
    #[arg(long)]
    model: Option<String>,

    /// Oracle sampling temperature.
    #[arg(long)]
    temperature: Option<f32>,

    /// Maximum oracle attempts per artifact, including the first.
    #[arg(long)]
    retry_budget: Option<u32>,

    /// Per-attempt oracle timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Parser)]
struct PlanArgs {
    /// Findings file (JSON or YAML).
    #[arg(long)]
    findings: Utf8PathBuf,

    /// Artifact to plan.
    #[arg(long)]
    artifact: Utf8PathBuf,

    /// Repository root (default: current directory).
    #[arg(long, default_value = ".")]
    repo_root: Utf8PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    match real_main().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(1)
        }
    }
}

async fn real_main() -> anyhow::Result<u8> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Run(args) => cmd_run(args).await,
        Command::Plan(args) => cmd_plan(args),
    }
}

async fn cmd_run(args: RunArgs) -> anyhow::Result<u8> {
    let file_config = config::load_or_default(&args.repo_root, args.config.as_deref())
        .context("load reviewfix.toml config")?;
    let merged = ConfigMerger::new(file_config).merge_run_args(&RunOverrides {
        dry_run: args.dry_run,
        model: args.model.clone(),
        temperature: args.temperature,
        retry_budget: args.retry_budget,
        timeout_secs: args.timeout_secs,
    });
    debug!(
        "merged config: model={}, retry_budget={}, timeout_secs={}, dry_run={}",
        merged.oracle.model_id,
        merged.oracle.retry_budget,
        merged.oracle.timeout_secs,
        merged.dry_run
    );

    let api_key = std::env::var(&merged.oracle.api_key_env)
        .ok()
        .filter(|k| !k.trim().is_empty());
    if api_key.is_none() {
        debug!(
            env = %merged.oracle.api_key_env,
            "no oracle token set; requests go unauthenticated"
        );
    }
    let budget = OracleBudget::from_config(&merged.oracle);
    let oracle =
        OracleClient::http(merged.oracle, api_key, budget).context("build oracle client")?;

    let settings = RunSettings {
        artifacts: args.artifacts,
        dry_run: merged.dry_run,
        require_unchanged_artifact: merged.require_unchanged_artifact,
    };
    let source = FsFindingSource::new(args.findings);
    let store = FsArtifactStore::new(args.repo_root);

    let (handle, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling runs");
            handle.cancel();
        }
    });

    let batch = run_batch(&settings, &source, &store, &oracle, tool_info(), &cancel).await;

    // Report paths are relative to the working directory, not the repo root.
    let writer = FsArtifactStore::new(Utf8PathBuf::from("."));
    write_reports(
        &batch,
        args.summary_out.as_deref(),
        args.patch_out.as_deref(),
        &writer,
    )?;
    if args.summary_out.is_some() {
        print!("{}", batch.report_md());
    } else {
        print!("{}", batch.summary_json()?);
    }

    info!(
        runs = batch.runs.len(),
        oracle_calls = oracle.budget().calls_made(),
        "batch finished"
    );
    Ok(batch.exit_code())
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<u8> {
    let source = FsFindingSource::new(args.findings);
    let store = FsArtifactStore::new(args.repo_root);
    let report = plan_artifact(&source, &store, &args.artifact)?;
    let json = serde_json::to_string_pretty(&report).context("serialize plan")?;
    println!("{json}");
    Ok(0)
}

fn tool_info() -> ToolInfo {
    ToolInfo {
        name: "reviewfix".to_string(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
        commit: None,
    }
}
