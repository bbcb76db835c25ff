//! hostlink-sim - replay host lifecycle scenarios against the bridge
//!
//! Reads a JSON scenario, drives a `HostBridge` over an in-memory host and
//! prints the resulting report as JSON.

mod scenario;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use hostlink::{BridgeConfig, ExecutionMode};

use scenario::{replay, Scenario};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Automated,
    Interactive,
}

impl From<Mode> for ExecutionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Automated => ExecutionMode::Automated,
            Mode::Interactive => ExecutionMode::Interactive,
        }
    }
}

/// Replay a host lifecycle scenario
#[derive(Debug, Parser)]
#[command(name = "hostlink-sim", version)]
struct Args {
    /// Scenario file (JSON)
    #[arg(long)]
    scenario: PathBuf,

    /// Bridge configuration file (JSON); defaults apply when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured execution mode
    #[arg(long, value_enum)]
    mode: Option<Mode>,
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => BridgeConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => BridgeConfig::default(),
    };
    if let Some(mode) = args.mode {
        config.execution_mode = mode.into();
    }

    let scenario = Scenario::load(&args.scenario)?;
    log::info!(
        "Replaying {} steps from {:?} in {:?} mode",
        scenario.steps.len(),
        args.scenario,
        config.execution_mode
    );

    let report = replay(&scenario, config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
