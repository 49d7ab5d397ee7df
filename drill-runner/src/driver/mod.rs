//! Cluster collaborator abstraction for stormdrill.
//!
//! The orchestration core never talks to a cloud, a scheduler or a storage
//! driver directly. It goes through these capability-shaped traits, which
//! are implemented by the in-memory [`MockCluster`] and by the Docker
//! Compose driver in `drill-docker`.
//!
//! # Design
//!
//! - [`Autoscaler`] resizes the cluster per zone and reports its size
//! - [`NodeLifecycle`] deletes or reboots nodes and lists fault candidates
//! - [`RegistryRefresh`] re-reads the scheduler and storage driver views
//! - [`ContextValidator`] validates and tears down application contexts
//! - [`ClusterSizeOracle`] checks the post-condition on cluster size

mod mock;

pub use mock::MockCluster;

use async_trait::async_trait;
use drill_types::{Node, RebootOptions, TeardownOptions, TestContext, Zone};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by cluster collaborators.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Backend refused the request (often transient for autoscalers).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Operation did not finish in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Node, zone or context not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Observed cluster size differs from the expected size.
    #[error("cluster size mismatch: expected {expected}, observed {observed}")]
    SizeMismatch {
        /// Expected node count.
        expected: u32,
        /// Observed node count.
        observed: u32,
    },

    /// Application or node validation failed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// General I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cloud autoscaling group spread across zones.
#[async_trait]
pub trait Autoscaler: Send + Sync {
    /// Set the desired node count in every zone.
    async fn set_cluster_size(&self, per_zone_count: u32, timeout: Duration)
        -> Result<(), DriverError>;

    /// Current total node count as the autoscaler sees it.
    async fn get_cluster_size(&self) -> Result<u32, DriverError>;

    /// Current zone topology. Never cached by callers.
    async fn get_zones(&self) -> Result<Vec<Zone>, DriverError>;
}

/// Node-level fault actions.
#[async_trait]
pub trait NodeLifecycle: Send + Sync {
    /// Delete a node; the autoscaler is expected to replace it.
    async fn delete_node(&self, node: &Node, timeout: Duration) -> Result<(), DriverError>;

    /// Nodes currently eligible for fault injection (storage driver nodes).
    ///
    /// Reads the registry view; refresh it first to see recent changes.
    async fn list_fault_candidate_nodes(&self) -> Vec<Node>;

    /// Reboot a node.
    async fn reboot_node(&self, node: &Node, opts: RebootOptions) -> Result<(), DriverError>;

    /// Wait until a rebooted node answers again.
    async fn wait_node_ready(&self, node: &Node, timeout: Duration) -> Result<(), DriverError>;
}

/// Re-reads of registries owned by the driver layer.
#[async_trait]
pub trait RegistryRefresh: Send + Sync {
    /// Refresh the scheduler's node registry.
    async fn refresh_scheduler_nodes(&self) -> Result<(), DriverError>;

    /// Refresh the storage driver's endpoint registry.
    async fn refresh_driver_endpoints(&self) -> Result<(), DriverError>;
}

/// Per-application validation and cleanup.
#[async_trait]
pub trait ContextValidator: Send + Sync {
    /// Validate one deployed application.
    async fn validate_context(&self, ctx: &TestContext) -> Result<(), DriverError>;

    /// Tear one deployed application down.
    async fn tear_down_context(
        &self,
        ctx: &TestContext,
        opts: TeardownOptions,
    ) -> Result<(), DriverError>;
}

/// Post-condition check on cluster size.
#[async_trait]
pub trait ClusterSizeOracle: Send + Sync {
    /// Fail unless the registry view holds exactly `expected` nodes.
    async fn validate_cluster_size(&self, expected: u32) -> Result<(), DriverError>;
}

/// One handle per collaborator, shared by every component of a campaign.
#[derive(Clone)]
pub struct Drivers {
    /// Autoscaling group.
    pub autoscaler: Arc<dyn Autoscaler>,
    /// Node fault actions.
    pub lifecycle: Arc<dyn NodeLifecycle>,
    /// Registry refreshes.
    pub registry: Arc<dyn RegistryRefresh>,
    /// Application validation and teardown.
    pub contexts: Arc<dyn ContextValidator>,
    /// Cluster size post-condition.
    pub oracle: Arc<dyn ClusterSizeOracle>,
}

impl Drivers {
    /// Use one cluster implementation for every collaborator.
    pub fn from_cluster<C>(cluster: Arc<C>) -> Self
    where
        C: Autoscaler
            + NodeLifecycle
            + RegistryRefresh
            + ContextValidator
            + ClusterSizeOracle
            + 'static,
    {
        Self {
            autoscaler: cluster.clone(),
            lifecycle: cluster.clone(),
            registry: cluster.clone(),
            contexts: cluster.clone(),
            oracle: cluster,
        }
    }
}

impl std::fmt::Debug for Drivers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Drivers").finish_non_exhaustive()
    }
}
