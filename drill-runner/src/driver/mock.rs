//! In-memory cluster for testing and demos.
//!
//! Models an autoscaling group spread over zones. The "cloud" node list
//! changes as soon as a resize or delete is issued; the registry view the
//! harness reads only catches up on refresh, the way scheduler and storage
//! driver registries do. Every call can be made to fail once, and calls are
//! recorded for verification.

use super::{
    Autoscaler, ClusterSizeOracle, ContextValidator, DriverError, NodeLifecycle, RegistryRefresh,
};
use async_trait::async_trait;
use drill_core::assert_cluster_size;
use drill_types::{Node, NodeId, RebootOptions, TeardownOptions, TestContext, Zone};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Mock cluster implementing every collaborator trait.
///
/// Clones share state, so a test can keep one handle while the
/// orchestration components hold others.
#[derive(Debug, Default)]
pub struct MockCluster {
    inner: Arc<Mutex<MockClusterInner>>,
}

#[derive(Debug, Default)]
struct MockClusterInner {
    zones: Vec<Zone>,
    nodes: Vec<Node>,
    registry: Vec<Node>,
    endpoints: Vec<NodeId>,
    desired_per_zone: u32,
    next_node: u64,
    replace_deleted: bool,

    set_size_calls: Vec<u32>,
    deleted: Vec<NodeId>,
    rebooted: Vec<NodeId>,
    validated: Vec<TestContext>,
    torn_down: Vec<TestContext>,
    registry_refreshes: u32,

    reject_set_size: u32,
    fail_next_zones: Option<String>,
    fail_next_fault: Option<String>,
    fail_next_refresh: Option<String>,
    fail_next_endpoints: Option<String>,
    fail_next_validate: Option<String>,
    fail_next_teardown: Option<String>,
}

impl MockClusterInner {
    fn add_node(&mut self, zone: &Zone) {
        let n = self.next_node;
        self.next_node += 1;
        self.nodes.push(Node::storage(
            format!("mock-{n:04}"),
            format!("{}-worker-{n}", zone.name()),
            zone.clone(),
        ));
    }

    /// Bring every zone to the desired count, like an autoscaling group would.
    fn reconcile(&mut self) {
        let zones = self.zones.clone();
        for zone in &zones {
            let mut count = self.nodes.iter().filter(|n| &n.zone == zone).count() as u32;
            while count < self.desired_per_zone {
                self.add_node(zone);
                count += 1;
            }
            while count > self.desired_per_zone {
                // Scale-in removes the newest node of the zone.
                if let Some(pos) = self.nodes.iter().rposition(|n| &n.zone == zone) {
                    self.nodes.remove(pos);
                }
                count -= 1;
            }
        }
    }
}

impl MockCluster {
    /// Create a cluster with `zones` zones of `nodes_per_zone` storage nodes.
    ///
    /// Deleted nodes are replaced immediately (autoscaler replacement).
    pub fn new(zones: usize, nodes_per_zone: u32) -> Self {
        let mut inner = MockClusterInner {
            zones: (0..zones).map(|i| Zone::new(format!("zone-{i}"))).collect(),
            desired_per_zone: nodes_per_zone,
            replace_deleted: true,
            ..Default::default()
        };
        inner.reconcile();
        inner.registry = inner.nodes.clone();
        inner.endpoints = inner.nodes.iter().map(|n| n.id.clone()).collect();
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockClusterInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Disable automatic replacement of deleted nodes.
    pub fn without_replacement(self) -> Self {
        self.lock().replace_deleted = false;
        self
    }

    /// Reject the next `times` resize calls.
    pub fn reject_set_size(&self, times: u32) {
        self.lock().reject_set_size = times;
    }

    /// Cause the next get_zones() to fail with the given error.
    pub fn fail_next_zones(&self, error: &str) {
        self.lock().fail_next_zones = Some(error.to_string());
    }

    /// Cause the next delete_node() or reboot_node() to fail.
    pub fn fail_next_fault(&self, error: &str) {
        self.lock().fail_next_fault = Some(error.to_string());
    }

    /// Cause the next refresh_scheduler_nodes() to fail.
    pub fn fail_next_refresh(&self, error: &str) {
        self.lock().fail_next_refresh = Some(error.to_string());
    }

    /// Cause the next refresh_driver_endpoints() to fail.
    pub fn fail_next_endpoints(&self, error: &str) {
        self.lock().fail_next_endpoints = Some(error.to_string());
    }

    /// Cause the next validate_context() to fail.
    pub fn fail_next_validate(&self, error: &str) {
        self.lock().fail_next_validate = Some(error.to_string());
    }

    /// Cause the next tear_down_context() to fail.
    pub fn fail_next_teardown(&self, error: &str) {
        self.lock().fail_next_teardown = Some(error.to_string());
    }

    /// Per-zone counts passed to set_cluster_size(), accepted or not.
    pub fn set_size_calls(&self) -> Vec<u32> {
        self.lock().set_size_calls.clone()
    }

    /// Nodes deleted so far.
    pub fn deleted_nodes(&self) -> Vec<NodeId> {
        self.lock().deleted.clone()
    }

    /// Nodes rebooted so far.
    pub fn rebooted_nodes(&self) -> Vec<NodeId> {
        self.lock().rebooted.clone()
    }

    /// Contexts validated so far (one entry per validation).
    pub fn validated_contexts(&self) -> Vec<TestContext> {
        self.lock().validated.clone()
    }

    /// Contexts torn down so far.
    pub fn torn_down_contexts(&self) -> Vec<TestContext> {
        self.lock().torn_down.clone()
    }

    /// Number of scheduler registry refreshes.
    pub fn registry_refreshes(&self) -> u32 {
        self.lock().registry_refreshes
    }

    /// Nodes as the cloud sees them right now.
    pub fn nodes(&self) -> Vec<Node> {
        self.lock().nodes.clone()
    }

    /// Nodes as the registry last saw them.
    pub fn registry_nodes(&self) -> Vec<Node> {
        self.lock().registry.clone()
    }

    /// Storage driver endpoints as last refreshed.
    pub fn driver_endpoints(&self) -> Vec<NodeId> {
        self.lock().endpoints.clone()
    }

    /// Desired per-zone count last accepted by the autoscaler.
    pub fn desired_per_zone(&self) -> u32 {
        self.lock().desired_per_zone
    }
}

impl Clone for MockCluster {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Autoscaler for MockCluster {
    async fn set_cluster_size(
        &self,
        per_zone_count: u32,
        _timeout: Duration,
    ) -> Result<(), DriverError> {
        let mut inner = self.lock();
        inner.set_size_calls.push(per_zone_count);

        // Check for forced rejection
        if inner.reject_set_size > 0 {
            inner.reject_set_size -= 1;
            return Err(DriverError::Rejected("scaling activity in progress".into()));
        }

        inner.desired_per_zone = per_zone_count;
        inner.reconcile();
        Ok(())
    }

    async fn get_cluster_size(&self) -> Result<u32, DriverError> {
        Ok(self.lock().nodes.len() as u32)
    }

    async fn get_zones(&self) -> Result<Vec<Zone>, DriverError> {
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_zones.take() {
            return Err(DriverError::Unavailable(error));
        }
        Ok(inner.zones.clone())
    }
}

#[async_trait]
impl NodeLifecycle for MockCluster {
    async fn delete_node(&self, node: &Node, _timeout: Duration) -> Result<(), DriverError> {
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_fault.take() {
            return Err(DriverError::Rejected(error));
        }

        let Some(pos) = inner.nodes.iter().position(|n| n.id == node.id) else {
            // Terminating an already terminated instance succeeds.
            if inner.deleted.contains(&node.id) {
                inner.deleted.push(node.id.clone());
                return Ok(());
            }
            return Err(DriverError::NotFound(node.id.to_string()));
        };
        inner.nodes.remove(pos);
        inner.deleted.push(node.id.clone());

        if inner.replace_deleted {
            inner.reconcile();
        }
        Ok(())
    }

    async fn list_fault_candidate_nodes(&self) -> Vec<Node> {
        self.lock()
            .registry
            .iter()
            .filter(|n| n.storage_driver_installed)
            .cloned()
            .collect()
    }

    async fn reboot_node(&self, node: &Node, _opts: RebootOptions) -> Result<(), DriverError> {
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_fault.take() {
            return Err(DriverError::Rejected(error));
        }
        if !inner.nodes.iter().any(|n| n.id == node.id) {
            return Err(DriverError::NotFound(node.id.to_string()));
        }
        inner.rebooted.push(node.id.clone());
        Ok(())
    }

    async fn wait_node_ready(&self, node: &Node, timeout: Duration) -> Result<(), DriverError> {
        if self.lock().nodes.iter().any(|n| n.id == node.id) {
            Ok(())
        } else {
            Err(DriverError::Timeout(timeout))
        }
    }
}

#[async_trait]
impl RegistryRefresh for MockCluster {
    async fn refresh_scheduler_nodes(&self) -> Result<(), DriverError> {
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_refresh.take() {
            return Err(DriverError::Unavailable(error));
        }
        inner.registry = inner.nodes.clone();
        inner.registry_refreshes += 1;
        Ok(())
    }

    async fn refresh_driver_endpoints(&self) -> Result<(), DriverError> {
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_endpoints.take() {
            return Err(DriverError::Unavailable(error));
        }
        inner.endpoints = inner
            .nodes
            .iter()
            .filter(|n| n.storage_driver_installed)
            .map(|n| n.id.clone())
            .collect();
        Ok(())
    }
}

#[async_trait]
impl ContextValidator for MockCluster {
    async fn validate_context(&self, ctx: &TestContext) -> Result<(), DriverError> {
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_validate.take() {
            return Err(DriverError::Validation(error));
        }
        inner.validated.push(ctx.clone());
        Ok(())
    }

    async fn tear_down_context(
        &self,
        ctx: &TestContext,
        _opts: TeardownOptions,
    ) -> Result<(), DriverError> {
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_teardown.take() {
            return Err(DriverError::Rejected(error));
        }
        inner.torn_down.push(ctx.clone());
        Ok(())
    }
}

#[async_trait]
impl ClusterSizeOracle for MockCluster {
    async fn validate_cluster_size(&self, expected: u32) -> Result<(), DriverError> {
        let inner = self.lock();
        let result = assert_cluster_size(expected, &inner.registry);
        if result.passed {
            Ok(())
        } else {
            Err(DriverError::SizeMismatch {
                expected,
                observed: inner.registry.len() as u32,
            })
        }
    }
}
