//! Cluster size controller.
//!
//! Issues per-zone resizes through the autoscaler and refreshes the
//! registries afterwards. Issuing a resize and observing convergence are
//! separate steps: [`ClusterSizeController::scale_to`] returns as soon as
//! the autoscaler accepts the request, and the caller decides when to
//! refresh and validate.

use crate::driver::{Autoscaler, ClusterSizeOracle, Drivers, RegistryRefresh};
use crate::error::{Result, RunnerError};
use crate::retry::{execute, Attempt};
use drill_core::ClusterTarget;
use drill_types::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Timeout handed to each individual resize call.
pub const SCALE_CALL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Drives the cluster to a target size and checks the result.
#[derive(Clone)]
pub struct ClusterSizeController {
    autoscaler: Arc<dyn Autoscaler>,
    registry: Arc<dyn RegistryRefresh>,
    oracle: Arc<dyn ClusterSizeOracle>,
    policy: RetryPolicy,
    call_timeout: Duration,
}

impl ClusterSizeController {
    /// Create a controller with the standard scale policy.
    pub fn new(drivers: &Drivers) -> Self {
        Self {
            autoscaler: drivers.autoscaler.clone(),
            registry: drivers.registry.clone(),
            oracle: drivers.oracle.clone(),
            policy: RetryPolicy::SCALE,
            call_timeout: SCALE_CALL_TIMEOUT,
        }
    }

    /// Override the retry policy and per-call timeout.
    pub fn with_policy(mut self, policy: RetryPolicy, call_timeout: Duration) -> Self {
        self.policy = policy;
        self.call_timeout = call_timeout;
        self
    }

    /// Resize the cluster to `total` nodes spread evenly over the zones.
    ///
    /// Zones are looked up fresh on every call. The per-zone count is
    /// `total / zones` (truncating); the returned target tells the caller
    /// what size to expect after convergence.
    ///
    /// # Errors
    ///
    /// Fails if zones cannot be read or the resize is still rejected when
    /// the retry budget runs out.
    pub async fn scale_to(&self, total: u32) -> Result<ClusterTarget> {
        let zones = self
            .autoscaler
            .get_zones()
            .await
            .map_err(RunnerError::ZoneLookup)?;
        let target = ClusterTarget::new(total, zones.len()).map_err(|_| RunnerError::NoZones)?;
        let per_zone = target.per_zone_count();

        if target.dropped() > 0 {
            warn!(
                requested = total,
                effective = target.effective_total(),
                zones = zones.len(),
                "requested size not divisible by zone count, remainder dropped"
            );
        }

        info!(total, per_zone, zones = zones.len(), "scaling cluster");

        let autoscaler = &self.autoscaler;
        let call_timeout = self.call_timeout;
        execute("set cluster size", self.policy, move || async move {
            Attempt::retry_on_err(autoscaler.set_cluster_size(per_zone, call_timeout).await)
        })
        .await
        .map_err(|source| RunnerError::Resize { per_zone, source })?;

        Ok(target)
    }

    /// Current size as reported by the autoscaler.
    pub async fn current_size(&self) -> Result<u32> {
        Ok(self.autoscaler.get_cluster_size().await?)
    }

    /// Refresh the scheduler node registry, then the driver endpoints.
    ///
    /// # Errors
    ///
    /// Either refresh failing is fatal.
    pub async fn refresh_registries(&self) -> Result<()> {
        self.registry
            .refresh_scheduler_nodes()
            .await
            .map_err(|source| RunnerError::RegistryRefresh {
                registry: "scheduler nodes",
                source,
            })?;
        self.registry
            .refresh_driver_endpoints()
            .await
            .map_err(|source| RunnerError::RegistryRefresh {
                registry: "driver endpoints",
                source,
            })
    }

    /// Fail unless the refreshed registry holds exactly `expected` nodes.
    pub async fn validate_size(&self, expected: u32) -> Result<()> {
        self.oracle
            .validate_cluster_size(expected)
            .await
            .map_err(|source| RunnerError::SizeValidation { expected, source })?;
        info!(expected, "cluster size validated");
        Ok(())
    }
}

impl std::fmt::Debug for ClusterSizeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterSizeController")
            .field("policy", &self.policy)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MockCluster;

    fn controller(cluster: &MockCluster) -> ClusterSizeController {
        ClusterSizeController::new(&Drivers::from_cluster(Arc::new(cluster.clone())))
    }

    #[tokio::test]
    async fn scale_to_divides_by_zones() {
        let three = MockCluster::new(3, 3);
        let target = controller(&three).scale_to(12).await.unwrap();
        assert_eq!(target.per_zone_count(), 4);
        assert_eq!(three.set_size_calls(), vec![4]);

        let two = MockCluster::new(2, 3);
        controller(&two).scale_to(12).await.unwrap();
        assert_eq!(two.set_size_calls(), vec![6]);
    }

    #[tokio::test]
    async fn scale_to_truncates_remainder() {
        let cluster = MockCluster::new(3, 3);
        let target = controller(&cluster).scale_to(10).await.unwrap();
        assert_eq!(target.per_zone_count(), 3);
        assert_eq!(target.effective_total(), 9);
        assert_eq!(target.dropped(), 1);
    }

    #[tokio::test]
    async fn scale_to_does_not_wait_for_convergence() {
        let cluster = MockCluster::new(3, 3);
        let controller = controller(&cluster);
        controller.scale_to(12).await.unwrap();

        // Registry still reports the old size until refreshed
        assert!(controller.validate_size(12).await.is_err());
        controller.refresh_registries().await.unwrap();
        controller.validate_size(12).await.unwrap();
    }

    #[tokio::test]
    async fn zone_lookup_failure_is_fatal() {
        let cluster = MockCluster::new(3, 3);
        cluster.fail_next_zones("metadata service down");
        let err = controller(&cluster).scale_to(12).await.unwrap_err();
        assert!(matches!(err, RunnerError::ZoneLookup(_)));
        assert!(cluster.set_size_calls().is_empty());
    }

    #[tokio::test]
    async fn zero_zones_is_an_error() {
        let cluster = MockCluster::new(0, 3);
        let err = controller(&cluster).scale_to(12).await.unwrap_err();
        assert!(matches!(err, RunnerError::NoZones));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_rejections_are_retried() {
        let cluster = MockCluster::new(3, 3);
        cluster.reject_set_size(2);
        controller(&cluster).scale_to(12).await.unwrap();
        assert_eq!(cluster.set_size_calls(), vec![4, 4, 4]);
        assert_eq!(cluster.nodes().len(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_rejection_exhausts_retries() {
        let cluster = MockCluster::new(3, 3);
        cluster.reject_set_size(u32::MAX);
        let err = controller(&cluster).scale_to(12).await.unwrap_err();
        match err {
            RunnerError::Resize { per_zone, source } => {
                assert_eq!(per_zone, 4);
                assert!(source.to_string().contains("rejected"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(cluster.set_size_calls().len(), 30);
    }

    #[tokio::test]
    async fn refresh_failure_names_registry() {
        let cluster = MockCluster::new(1, 1);
        cluster.fail_next_endpoints("driver api down");
        let err = controller(&cluster).refresh_registries().await.unwrap_err();
        assert!(matches!(
            err,
            RunnerError::RegistryRefresh {
                registry: "driver endpoints",
                ..
            }
        ));
    }
}
