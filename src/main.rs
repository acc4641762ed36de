//! Command-line entry point.
//!
//! # Commands
//!
//! * `replay <FILE>`: fold a recorded run through the orchestrator, print the
//!   stage after every snapshot and the final snapshot as JSON.  `FILE` holds
//!   wire events as a JSON array, a `{ "events": [...] }` debug-run response,
//!   or one event per line.
//! * `options [--text <TEXT>]`: print the subscribe message the configured
//!   run defaults would send.
//!
//! # Startup sequence
//!
//! 1. Parse arguments.
//! 2. Load [`AppConfig`] (default when the file is missing).
//! 3. Initialise logging with the configured default level.
//! 4. Run the command.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use assist_pipeline::config::{AppConfig, AppPaths};
use assist_pipeline::pipeline::{start_run, PipelineRun};
use assist_pipeline::transport::ReplayTransport;

#[derive(Parser, Debug)]
#[command(name = "assist-pipeline")]
#[command(version, about = "Track voice assistant pipeline runs", long_about = None)]
struct Cli {
    /// Path to settings.toml (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a recorded run and print every snapshot
    Replay {
        /// Recording file, or a name inside the runs directory
        file: PathBuf,

        /// Only print the final snapshot
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print the run request built from the configured defaults
    Options {
        /// Input text for runs that start after STT
        #[arg(long)]
        text: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = AppPaths::new();

    let config_path = cli.config.unwrap_or_else(|| paths.settings_file.clone());
    let config = AppConfig::load_from(&config_path)?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log.level.as_str()))
        .init();
    log::debug!("config loaded from {}", config_path.display());

    match cli.command {
        Commands::Replay { file, quiet } => {
            replay(&config, &paths.resolve_recording(&file), quiet).await
        }
        Commands::Options { text } => {
            let options = config.run.to_options(text.as_deref());
            options.validate()?;
            println!("{}", serde_json::to_string_pretty(&options.subscribe_payload()?)?);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// replay
// ---------------------------------------------------------------------------

async fn replay(config: &AppConfig, file: &Path, quiet: bool) -> Result<()> {
    let messages = read_recording(file)?;
    log::info!("replaying {} messages from {}", messages.len(), file.display());

    let transport = ReplayTransport::new(messages);
    let last: Arc<Mutex<Option<PipelineRun>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&last);

    let handle = start_run(&transport, config.run.to_options(Some("")), move |run| {
        if !quiet {
            let kind = run.events.last().map(|event| event.kind()).unwrap_or("-");
            println!("{:>3}  {:<6}  {}", run.events.len(), run.stage.label(), kind);
        }
        if let Ok(mut slot) = sink.lock() {
            *slot = Some(run);
        }
    })
    .await?;
    handle.closed().await;

    let last = match last.lock() {
        Ok(mut slot) => slot.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    match last {
        Some(run) => {
            println!("{}", serde_json::to_string_pretty(&run)?);
            if !run.is_finished() {
                log::warn!("recording ended before the run finished");
            }
            Ok(())
        }
        None => bail!("{} contains no run-start event", file.display()),
    }
}

/// Read a recording as a JSON array, a debug-run object, or JSON lines.
fn read_recording(file: &Path) -> Result<Vec<Value>> {
    let content =
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;

    if let Ok(value) = serde_json::from_str::<Value>(&content) {
        match value {
            Value::Array(messages) => return Ok(messages),
            Value::Object(mut object) => {
                if let Some(Value::Array(messages)) = object.remove("events") {
                    return Ok(messages);
                }
                return Ok(vec![Value::Object(object)]);
            }
            _ => bail!("{} is not a run recording", file.display()),
        }
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid JSON", file.display(), n + 1))
        })
        .collect()
}
