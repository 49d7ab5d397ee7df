//! Run a scenario and report.

use anyhow::{Context, Result};
use drill_core::{SeededSelector, VictimSelector, WallClockSelector};
use drill_docker::ComposeCluster;
use drill_runner::{Config, Drivers, MockCluster, Scenario, ScenarioContext, ScenarioReport};
use std::sync::Arc;
use tracing::{info, warn};

/// Options that pick the driver and selector for a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Use the in-memory cluster.
    pub mock: bool,
    /// Seed for victim selection; wall-clock seeded when absent.
    pub seed: Option<u64>,
    /// Bring the compose topology down afterwards.
    pub down: bool,
}

/// Run the scenario command.
pub async fn run(scenario: Scenario, config: &Config, options: &RunOptions) -> Result<()> {
    if options.mock {
        let cluster = MockCluster::new(config.mock.zones, config.mock.nodes_per_zone);
        let drivers = Drivers::from_cluster(Arc::new(cluster));
        return execute(scenario, &drivers, config, options.seed).await;
    }

    let cluster = Arc::new(
        ComposeCluster::new(&config.docker).context("Failed to connect to Docker daemon")?,
    );
    info!(project = cluster.project_name(), "starting compose topology");
    cluster
        .setup()
        .await
        .context("Failed to start compose topology")?;

    let drivers = Drivers::from_cluster(cluster.clone());
    let result = execute(scenario, &drivers, config, options.seed).await;

    if options.down {
        if let Err(e) = cluster.teardown().await {
            warn!(error = %e, "compose teardown failed");
        }
    }
    result
}

async fn execute(
    scenario: Scenario,
    drivers: &Drivers,
    config: &Config,
    seed: Option<u64>,
) -> Result<()> {
    let mut ctx = ScenarioContext::new(scenario, drivers, config, selector(seed));
    info!(scenario = %scenario, contexts = ctx.contexts().len(), "scenario starting");

    let report = scenario.run(&mut ctx).await;
    print_report(&report);

    report
        .into_result()
        .with_context(|| format!("Scenario {scenario} failed"))
}

fn selector(seed: Option<u64>) -> Box<dyn VictimSelector> {
    match seed {
        Some(seed) => Box::new(SeededSelector::new(seed)),
        None => Box::new(WallClockSelector::new()),
    }
}

fn print_report(report: &ScenarioReport) {
    println!();
    println!("=== stormdrill {} ===", report.name);
    println!("  Rounds:   {}", report.rounds);
    println!(
        "  Stopped:  {}",
        if report.expired {
            "run time elapsed"
        } else {
            "finished"
        }
    );
    match &report.failure {
        Some(e) => println!("  Result:   FAILED ({e})"),
        None => println!("  Result:   PASSED"),
    }
    if !report.teardown_failures.is_empty() {
        println!("  Teardown failures:");
        for failure in &report.teardown_failures {
            println!("    {}: {}", failure.context, failure.error);
        }
    }
}
