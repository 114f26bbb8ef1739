mod cli;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use conductor::agent::{CommandRuntime, KeywordRouter, StaticToolRegistry, PARENT_TOOLS_ENV};
use conductor::store::RunStore;
use conductor::{schema, Orchestrator, OrchestratorConfig, Request};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level().to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let state_dir = cli.state_dir();
    match cli.command {
        Commands::Run {
            file,
            json,
            no_save,
            workdir,
        } => run(&state_dir, &file, json, no_save, workdir).await,
        Commands::History { limit } => history(&state_dir, limit),
        Commands::Show { run_id, json } => show(&state_dir, &run_id, json),
        Commands::Delete { run_id } => delete(&state_dir, &run_id),
        Commands::Schema { tool } => {
            let Some(parameters) = schema::parameters(&tool) else {
                bail!(
                    "Unknown tool '{}'. Expected one of: {}",
                    tool,
                    schema::TOOLS.join(", ")
                );
            };
            println!("{}", serde_json::to_string_pretty(&parameters)?);
            Ok(())
        }
    }
}

/// Exit status of `run` when any task failed or was cancelled
const PARTIAL_EXIT_CODE: i32 = 2;

/// State dir config first, then the global one, then defaults.
fn load_config(state_dir: &Path) -> Result<OrchestratorConfig> {
    if state_dir.join("config.json").exists() {
        return OrchestratorConfig::load(state_dir).context("Failed to load config");
    }
    match OrchestratorConfig::global_path() {
        Some(global) => OrchestratorConfig::load(&global).context("Failed to load global config"),
        None => Ok(OrchestratorConfig::default()),
    }
}

fn read_request(file: &str) -> Result<Request> {
    let content = if file == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))?
    };
    serde_json::from_str(&content).context("Failed to parse request")
}

/// Tools the parent session exposes, from a comma-separated env var
fn parent_tools() -> StaticToolRegistry {
    let names = std::env::var(PARENT_TOOLS_ENV).unwrap_or_default();
    StaticToolRegistry::new(
        names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from),
    )
}

async fn run(
    state_dir: &Path,
    file: &str,
    json: bool,
    no_save: bool,
    workdir: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(state_dir)?;
    let request = read_request(file)?;
    let store = RunStore::new(state_dir)?;

    let workdir = match workdir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to resolve working directory")?,
    };
    let runtime = CommandRuntime::new(&config, workdir).with_log_dir(state_dir.join("logs"));
    let orchestrator = Arc::new(Orchestrator::new(
        config,
        Arc::new(runtime),
        Arc::new(KeywordRouter::new()),
        Arc::new(parent_tools()),
    ));

    let on_signal = Arc::clone(&orchestrator);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            on_signal.shutdown();
        }
    });

    let report = orchestrator.handle(request).await?;

    if !no_save {
        let path = store.save(&report)?;
        info!(run_id = %report.run_id, path = %path.display(), "report saved");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.digest);
    }
    if !report.is_complete() {
        std::process::exit(PARTIAL_EXIT_CODE);
    }
    Ok(())
}

fn history(state_dir: &Path, limit: usize) -> Result<()> {
    let store = RunStore::new(state_dir)?;
    let reports = store.list()?;
    if reports.is_empty() {
        println!("No runs recorded in {}", state_dir.display());
        return Ok(());
    }
    for report in reports.iter().take(limit) {
        println!(
            "{}  {}  {:<8} {:<8} {}/{} succeeded  {}ms",
            report.run_id,
            report.created_at.format("%Y-%m-%d %H:%M:%S"),
            report.topology.as_str(),
            report.outcome.as_str(),
            report.succeeded,
            report.tasks.len(),
            report.total_duration_ms
        );
    }
    Ok(())
}

fn show(state_dir: &Path, run_id: &str, json: bool) -> Result<()> {
    let store = RunStore::new(state_dir)?;
    let Some(report) = store.load(run_id)? else {
        bail!("No run with id '{}'", run_id);
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.digest);
    }
    Ok(())
}

fn delete(state_dir: &Path, run_id: &str) -> Result<()> {
    let store = RunStore::new(state_dir)?;
    if !store.delete(run_id)? {
        bail!("No run with id '{}'", run_id);
    }
    println!("Deleted {}", run_id);
    Ok(())
}
