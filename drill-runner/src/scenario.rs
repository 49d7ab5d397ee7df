//! Resilience scenarios.
//!
//! Each scenario runs against one [`ScenarioContext`], which carries the
//! application contexts and the orchestration components for that run.
//! Nothing is shared between scenarios. Every scenario tears its contexts
//! down at the end, whatever happened before.

use crate::cluster::ClusterSizeController;
use crate::config::Config;
use crate::driver::Drivers;
use crate::error::{Result, RunnerError};
use crate::recovery::{expected_size, RecoveryValidator, TeardownFailure};
use crate::scheduler::ChaosScheduler;
use drill_core::VictimSelector;
use drill_types::TestContext;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

/// The scenarios stormdrill can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Kill random storage nodes on a cadence and check replacement.
    KillRandomNodes,
    /// Scale the cluster up by half, then back down.
    ScaleUpDown,
    /// Reboot every storage node in turn.
    RebootNodes,
}

impl Scenario {
    /// Scenario name, also used as the context namespace prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::KillRandomNodes => "kill-random-nodes",
            Scenario::ScaleUpDown => "scale-up-down",
            Scenario::RebootNodes => "reboot-nodes",
        }
    }

    /// Run the scenario.
    pub async fn run(self, ctx: &mut ScenarioContext) -> ScenarioReport {
        match self {
            Scenario::KillRandomNodes => kill_random_nodes(ctx).await,
            Scenario::ScaleUpDown => scale_up_down(ctx).await,
            Scenario::RebootNodes => reboot_nodes(ctx).await,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one scenario run needs, passed by reference through each phase.
#[derive(Debug)]
pub struct ScenarioContext {
    name: String,
    contexts: Vec<TestContext>,
    cluster: ClusterSizeController,
    recovery: RecoveryValidator,
    scheduler: ChaosScheduler,
    storage_recovery_timeout: Duration,
}

impl ScenarioContext {
    /// Build the context for `scenario` from configuration.
    ///
    /// One context per application and scale-factor index is registered,
    /// named `<scenario>-<i>`.
    pub fn new(
        scenario: Scenario,
        drivers: &Drivers,
        config: &Config,
        selector: Box<dyn VictimSelector>,
    ) -> Self {
        let name = scenario.as_str().to_string();
        let contexts = (0..config.campaign.scale_factor)
            .flat_map(|i| {
                let namespace = format!("{name}-{i}");
                config
                    .campaign
                    .apps
                    .iter()
                    .map(move |app| TestContext::new(app, &namespace))
            })
            .collect();

        let cluster = ClusterSizeController::new(drivers)
            .with_policy(config.retry.scale_policy(), config.retry.scale_call_timeout());
        let recovery =
            RecoveryValidator::new(drivers, cluster.clone(), selector, config.recovery.options());

        Self {
            name,
            contexts,
            cluster,
            recovery,
            scheduler: ChaosScheduler::new(config.campaign.budget(), config.campaign.fault),
            storage_recovery_timeout: config.recovery.storage_recovery_timeout(),
        }
    }

    /// Scenario name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Application contexts under test.
    pub fn contexts(&self) -> &[TestContext] {
        &self.contexts
    }

    /// Tear everything down and build the report.
    async fn finish(&self, rounds: u32, expired: bool, result: Result<()>) -> ScenarioReport {
        let teardown_failures = self.recovery.tear_down_contexts(&self.contexts).await;
        self.report(rounds, expired, result.err(), teardown_failures)
    }

    fn report(
        &self,
        rounds: u32,
        expired: bool,
        failure: Option<RunnerError>,
        teardown_failures: Vec<TeardownFailure>,
    ) -> ScenarioReport {
        if let Some(e) = &failure {
            error!(scenario = %self.name, error = %e, "scenario failed");
        }
        ScenarioReport {
            name: self.name.clone(),
            rounds,
            expired,
            failure,
            teardown_failures,
        }
    }
}

/// Result of one scenario run.
#[derive(Debug)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: String,
    /// Fault cycles (or reboots) completed.
    pub rounds: u32,
    /// Whether the run-time budget ended the scenario.
    pub expired: bool,
    /// First fatal error, if any.
    pub failure: Option<RunnerError>,
    /// Contexts that could not be torn down.
    pub teardown_failures: Vec<TeardownFailure>,
}

impl ScenarioReport {
    /// Whether the scenario and its teardown both succeeded.
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.teardown_failures.is_empty()
    }

    /// Convert into a result.
    ///
    /// The original failure wins; teardown failures are reported only when
    /// nothing else failed.
    pub fn into_result(self) -> Result<()> {
        if let Some(e) = self.failure {
            return Err(e);
        }
        if !self.teardown_failures.is_empty() {
            return Err(RunnerError::Teardown {
                failed: self.teardown_failures.len(),
            });
        }
        Ok(())
    }
}

/// Validate the applications, then run the chaos campaign.
pub async fn kill_random_nodes(ctx: &mut ScenarioContext) -> ScenarioReport {
    info!(scenario = %ctx.name, contexts = ctx.contexts.len(), "validate applications");
    if let Err(e) = ctx.recovery.validate_contexts(&ctx.contexts).await {
        return ctx.finish(0, false, Err(e)).await;
    }

    let outcome = ctx.scheduler.run(&mut ctx.recovery, &ctx.contexts).await;
    let expired = outcome.expired();
    ctx.report(
        outcome.rounds,
        expired,
        outcome.failure,
        outcome.teardown_failures,
    )
}

/// Scale up by half, validate, scale back down, validate.
pub async fn scale_up_down(ctx: &mut ScenarioContext) -> ScenarioReport {
    let result = scale_up_down_steps(ctx).await;
    ctx.finish(0, false, result).await
}

async fn scale_up_down_steps(ctx: &ScenarioContext) -> Result<()> {
    info!(scenario = %ctx.name, "validate applications");
    ctx.recovery.validate_contexts(&ctx.contexts).await?;

    let initial = ctx.cluster.current_size().await?;
    let scale_up = initial + initial / 2;

    info!(from = initial, to = scale_up, "scale up cluster");
    let target = ctx.cluster.scale_to(scale_up).await?;
    ctx.cluster.refresh_registries().await?;
    ctx.cluster.validate_size(target.effective_total()).await?;

    info!(to = initial, "scale down cluster back to original size");
    let target = ctx.cluster.scale_to(initial).await?;

    info!(
        wait_secs = ctx.storage_recovery_timeout.as_secs(),
        "waiting for storage node recovery"
    );
    sleep(ctx.storage_recovery_timeout).await;

    ctx.cluster.refresh_registries().await?;
    ctx.cluster.validate_size(target.effective_total()).await?;

    ctx.recovery.validate_contexts(&ctx.contexts).await
}

/// Reboot every candidate node in turn, validating after each.
pub async fn reboot_nodes(ctx: &mut ScenarioContext) -> ScenarioReport {
    let mut rounds = 0;
    let result = reboot_nodes_steps(ctx, &mut rounds).await;
    ctx.finish(rounds, false, result).await
}

async fn reboot_nodes_steps(ctx: &ScenarioContext, rounds: &mut u32) -> Result<()> {
    info!(scenario = %ctx.name, "validate applications");
    ctx.recovery.validate_contexts(&ctx.contexts).await?;

    let candidates = ctx.recovery.candidates().await;
    if candidates.is_empty() {
        return Err(RunnerError::NoCandidates);
    }
    let expected = expected_size(&candidates);

    for node in &candidates {
        ctx.recovery.reboot_and_recover(node, expected).await?;
        ctx.recovery.validate_contexts(&ctx.contexts).await?;
        *rounds += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverError;

    fn report(failure: Option<RunnerError>, teardown: usize) -> ScenarioReport {
        ScenarioReport {
            name: "scale-up-down".into(),
            rounds: 0,
            expired: false,
            failure,
            teardown_failures: (0..teardown)
                .map(|i| TeardownFailure {
                    context: format!("scale-up-down-{i}/postgres"),
                    error: DriverError::Rejected("stuck".into()),
                })
                .collect(),
        }
    }

    #[test]
    fn clean_report_is_ok() {
        let report = report(None, 0);
        assert!(report.is_success());
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn original_failure_wins_over_teardown() {
        let err = report(Some(RunnerError::NoCandidates), 2)
            .into_result()
            .unwrap_err();
        assert!(matches!(err, RunnerError::NoCandidates));
    }

    #[test]
    fn teardown_failure_reported_alone() {
        let err = report(None, 2).into_result().unwrap_err();
        assert!(matches!(err, RunnerError::Teardown { failed: 2 }));
    }

    #[test]
    fn scenario_names() {
        assert_eq!(Scenario::KillRandomNodes.to_string(), "kill-random-nodes");
        assert_eq!(Scenario::ScaleUpDown.as_str(), "scale-up-down");
        assert_eq!(Scenario::RebootNodes.as_str(), "reboot-nodes");
    }
}
