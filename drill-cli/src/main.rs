//! # stormdrill
//!
//! Runs one resilience scenario against a cluster and reports the outcome.
//!
//! ## Commands
//!
//! - `kill-random-nodes`: delete (or reboot) random storage nodes on a cadence
//! - `scale-up-down`: scale the cluster up by half, then back down
//! - `reboot-nodes`: reboot every storage node in turn
//! - `show-config`: print the effective configuration
//!
//! ## Example
//!
//! ```bash
//! # One fault cycle against the in-memory cluster
//! stormdrill --mock kill-random-nodes
//!
//! # Two hours at chaos level 5 against the compose topology
//! stormdrill --config demos/stormdrill.toml --chaos-level 5 --total-run-minutes 120 kill-random-nodes
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use drill_runner::config::DEFAULT_CONFIG_PATH;
use drill_runner::{Config, Scenario};
use drill_types::{ChaosLevel, FaultKind};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::run::RunOptions;
use commands::{run, show_config};

/// Resilience campaigns for autoscaled storage clusters.
#[derive(Parser, Debug)]
#[command(name = "stormdrill")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: stormdrill.toml if present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Use the in-memory cluster instead of Docker Compose
    #[arg(long, global = true)]
    mock: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Seed victim selection for a reproducible run
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Override the chaos level (1-5; anything else runs every 30 minutes)
    #[arg(long, global = true)]
    chaos_level: Option<u8>,

    /// Override the total run time in minutes (0 runs a single cycle)
    #[arg(long, global = true)]
    total_run_minutes: Option<u64>,

    /// Override the fault injected each cycle (delete or reboot)
    #[arg(long, global = true)]
    fault: Option<FaultKind>,

    /// Bring the compose topology down after the scenario
    #[arg(long, global = true)]
    down: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Kill random storage nodes and check the autoscaler replaces them
    KillRandomNodes,

    /// Scale the cluster up by half, then back down
    ScaleUpDown,

    /// Reboot every storage node in turn
    RebootNodes,

    /// Print the effective configuration
    ShowConfig,
}

impl Commands {
    fn scenario(&self) -> Option<Scenario> {
        match self {
            Commands::KillRandomNodes => Some(Scenario::KillRandomNodes),
            Commands::ScaleUpDown => Some(Scenario::ScaleUpDown),
            Commands::RebootNodes => Some(Scenario::RebootNodes),
            Commands::ShowConfig => None,
        }
    }
}

impl Cli {
    /// Apply command-line overrides on top of the file configuration.
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(level) = self.chaos_level {
            config.campaign.chaos_level = ChaosLevel::new(level);
        }
        if let Some(minutes) = self.total_run_minutes {
            config.campaign.total_run_minutes = minutes;
        }
        if let Some(fault) = self.fault {
            config.campaign.fault = fault;
        }
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            mock: self.mock,
            seed: self.seed,
            down: self.down,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    match cli.command.scenario() {
        Some(scenario) => run::run(scenario, &config, &cli.run_options()).await?,
        None => show_config::run(&config),
    }

    Ok(())
}

/// Load configuration.
///
/// An explicit path must exist. Without one, `stormdrill.toml` in the
/// working directory is used when present and defaults otherwise.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path,
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if !default.exists() {
                return Ok(Config::default());
            }
            default
        }
    };
    Config::from_file(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
