//! Fault cycles and recovery checks.
//!
//! A fault cycle is strictly ordered and aborts on the first failing step:
//!
//! 1. pick a victim from the candidate snapshot
//! 2. delete (or reboot) it
//! 3. wait for the replacement to settle (or the node to answer again)
//! 4. refresh the scheduler registry and the driver endpoints
//! 5. validate the cluster is back to the candidate count, exactly
//!
//! Context validation and teardown live here too, since every scenario
//! needs them after a cycle.

use crate::cluster::ClusterSizeController;
use crate::driver::{ContextValidator, DriverError, Drivers, NodeLifecycle};
use crate::error::{Result, RunnerError};
use crate::retry::{execute, Attempt};
use drill_core::VictimSelector;
use drill_types::{FaultKind, Node, RebootOptions, RetryPolicy, TeardownOptions, TestContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

/// Timing and options for recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryOptions {
    /// Fixed wait after a delete for the autoscaler to replace the node.
    pub settle: Duration,
    /// Timeout handed to the node-delete call.
    pub node_delete_timeout: Duration,
    /// Options for reboot faults.
    pub reboot: RebootOptions,
    /// How long a rebooted node may take to answer again.
    pub reboot_ready_timeout: Duration,
    /// Options forwarded to context teardown.
    pub teardown: TeardownOptions,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(10 * 60),
            node_delete_timeout: Duration::from_secs(7 * 60),
            reboot: RebootOptions::default(),
            reboot_ready_timeout: Duration::from_secs(15 * 60),
            teardown: TeardownOptions::default(),
        }
    }
}

/// A context that could not be torn down.
#[derive(Debug)]
pub struct TeardownFailure {
    /// Context label (`namespace/app`).
    pub context: String,
    /// Error reported by the driver.
    pub error: DriverError,
}

/// Runs fault cycles and validates the cluster recovered.
pub struct RecoveryValidator {
    lifecycle: Arc<dyn NodeLifecycle>,
    contexts: Arc<dyn ContextValidator>,
    cluster: ClusterSizeController,
    selector: Box<dyn VictimSelector>,
    options: RecoveryOptions,
}

impl RecoveryValidator {
    /// Create a validator over `drivers`.
    pub fn new(
        drivers: &Drivers,
        cluster: ClusterSizeController,
        selector: Box<dyn VictimSelector>,
        options: RecoveryOptions,
    ) -> Self {
        Self {
            lifecycle: drivers.lifecycle.clone(),
            contexts: drivers.contexts.clone(),
            cluster,
            selector,
            options,
        }
    }

    /// Take the candidate snapshot for a campaign.
    pub async fn candidates(&self) -> Vec<Node> {
        self.lifecycle.list_fault_candidate_nodes().await
    }

    /// Run one fault cycle of the given kind against a random candidate.
    ///
    /// # Errors
    ///
    /// Any failing step aborts the cycle and is returned as-is.
    pub async fn run_fault_cycle(&mut self, kind: FaultKind, candidates: &[Node]) -> Result<()> {
        let victim = self
            .selector
            .pick(candidates)
            .ok_or(RunnerError::NoCandidates)?
            .clone();
        let expected = expected_size(candidates);

        match kind {
            FaultKind::Delete => self.delete_and_recover(&victim, expected).await,
            FaultKind::Reboot => self.reboot_and_recover(&victim, expected).await,
        }
    }

    /// Delete `victim`, wait for its replacement and check the size.
    pub async fn delete_and_recover(&self, victim: &Node, expected: u32) -> Result<()> {
        info!(node = %victim.id, name = %victim.name, zone = %victim.zone, "deleting node");
        self.lifecycle
            .delete_node(victim, self.options.node_delete_timeout)
            .await
            .map_err(|source| RunnerError::Fault {
                node: victim.id.clone(),
                source,
            })?;

        info!(settle_secs = self.options.settle.as_secs(), "waiting for replacement");
        sleep(self.options.settle).await;

        self.cluster.refresh_registries().await?;
        self.cluster.validate_size(expected).await
    }

    /// Reboot `victim`, wait until it answers and check the size.
    pub async fn reboot_and_recover(&self, victim: &Node, expected: u32) -> Result<()> {
        info!(
            node = %victim.id,
            name = %victim.name,
            force = self.options.reboot.force,
            "rebooting node"
        );

        let reboot = self.options.reboot;
        let policy = RetryPolicy::new(reboot.command_timeout, reboot.command_retry);
        let lifecycle = &self.lifecycle;
        execute("reboot node", policy, move || async move {
            Attempt::retry_on_err(lifecycle.reboot_node(victim, reboot).await)
        })
        .await
        .map_err(|source| RunnerError::Fault {
            node: victim.id.clone(),
            source,
        })?;

        self.lifecycle
            .wait_node_ready(victim, self.options.reboot_ready_timeout)
            .await
            .map_err(|source| RunnerError::Fault {
                node: victim.id.clone(),
                source,
            })?;
        info!(node = %victim.id, "node is back");

        self.cluster.refresh_registries().await?;
        self.cluster.validate_size(expected).await
    }

    /// Validate every context, stopping at the first failure.
    pub async fn validate_contexts(&self, contexts: &[TestContext]) -> Result<()> {
        for ctx in contexts {
            self.contexts
                .validate_context(ctx)
                .await
                .map_err(|source| RunnerError::ContextValidation {
                    context: ctx.to_string(),
                    source,
                })?;
        }
        info!(count = contexts.len(), "contexts validated");
        Ok(())
    }

    /// Tear down every context, continuing past failures.
    ///
    /// Returns the contexts that could not be torn down.
    pub async fn tear_down_contexts(&self, contexts: &[TestContext]) -> Vec<TeardownFailure> {
        let mut failures = Vec::new();
        for ctx in contexts {
            match self
                .contexts
                .tear_down_context(ctx, self.options.teardown)
                .await
            {
                Ok(()) => info!(context = %ctx, "context torn down"),
                Err(e) => {
                    error!(context = %ctx, error = %e, "teardown failed");
                    failures.push(TeardownFailure {
                        context: ctx.to_string(),
                        error: e,
                    });
                }
            }
        }
        failures
    }
}

impl std::fmt::Debug for RecoveryValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryValidator")
            .field("cluster", &self.cluster)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Size the cluster must return to after a cycle over `candidates`.
pub(crate) fn expected_size(candidates: &[Node]) -> u32 {
    u32::try_from(candidates.len()).unwrap_or(u32::MAX)
}
