//! Docker Compose backed cluster.
//!
//! Each compose service whose name starts with the zone prefix is a zone,
//! and each of its replicas is a node. Resizing runs
//! `docker compose up --scale`, deleting a node force-removes its container
//! and a scheduler refresh plays the autoscaling group: it scales every zone
//! back to the desired count before re-listing the nodes.

use crate::containers::{
    app_filters, is_ready, node_filters, nodes_from_summaries, observed_per_zone, parse_zones,
    scale_args,
};
use async_trait::async_trait;
use bollard::container::{
    InspectContainerOptions, ListContainersOptions, LogsOptions, RemoveContainerOptions,
    RestartContainerOptions,
};
use bollard::Docker;
use drill_core::assert_cluster_size;
use drill_runner::config::DockerConfig;
use drill_runner::{
    Autoscaler, ClusterSizeOracle, ContextValidator, DriverError, NodeLifecycle, RegistryRefresh,
};
use drill_types::{Node, NodeId, RebootOptions, TeardownOptions, TestContext, Zone};
use futures_util::StreamExt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Interval between container state polls.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How long teardown waits for application containers to disappear.
const LEAK_CLEANUP_TIMEOUT: Duration = Duration::from_secs(60);

/// Log lines attached to a failed validation.
const LOG_TAIL_LINES: &str = "20";

/// Errors that can occur while driving the compose cluster.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Docker API error.
    #[error("docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// Docker Compose CLI error.
    #[error("compose error: {0}")]
    Compose(String),

    /// Operation did not finish in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// General I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ComposeError> for DriverError {
    fn from(e: ComposeError) -> Self {
        match e {
            ComposeError::Docker(bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message,
            }) => DriverError::NotFound(message),
            ComposeError::Docker(other) => DriverError::Unavailable(other.to_string()),
            ComposeError::Compose(msg) => DriverError::Rejected(msg),
            ComposeError::Timeout(d) => DriverError::Timeout(d),
            ComposeError::Io(e) => DriverError::Io(e),
        }
    }
}

/// Registry views, updated only on refresh.
#[derive(Debug, Default)]
struct Registry {
    desired_per_zone: Option<u32>,
    nodes: Vec<Node>,
    endpoints: Vec<NodeId>,
}

impl Registry {
    /// Take the desired per-zone count from the listed nodes, unless a
    /// resize already set one.
    fn adopt_observed_size(&mut self) {
        if self.desired_per_zone.is_none() {
            self.desired_per_zone = observed_per_zone(&self.nodes);
        }
    }
}

/// Cluster made of Docker Compose service replicas.
pub struct ComposeCluster {
    /// bollard Docker client.
    docker: Docker,
    /// Path to the compose file.
    compose_file: PathBuf,
    /// Compose project name.
    project_name: String,
    /// Services with this prefix are zones.
    zone_prefix: String,
    registry: Mutex<Registry>,
}

impl ComposeCluster {
    /// Connect to the local Docker daemon.
    pub fn new(config: &DockerConfig) -> Result<Self, ComposeError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self {
            docker,
            compose_file: config.compose_file.clone(),
            project_name: config.project_name.clone(),
            zone_prefix: config.zone_prefix.clone(),
            registry: Mutex::new(Registry::default()),
        })
    }

    /// Compose project name.
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Storage driver endpoints as of the last refresh.
    pub fn driver_endpoints(&self) -> Vec<NodeId> {
        self.registry().endpoints.clone()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start the topology and take the first registry snapshot.
    ///
    /// The per-zone count seen here becomes the size that scheduler
    /// refreshes restore after a node is deleted.
    pub async fn setup(&self) -> Result<(), ComposeError> {
        self.compose(&["up", "-d", "--wait"]).await?;
        self.relist().await?;
        let mut registry = self.registry();
        registry.adopt_observed_size();
        info!(
            nodes = registry.nodes.len(),
            per_zone = registry.desired_per_zone,
            "compose topology up"
        );
        Ok(())
    }

    /// Per-zone count scheduler refreshes reconcile to, once known.
    pub fn desired_per_zone(&self) -> Option<u32> {
        self.registry().desired_per_zone
    }

    /// Tear the topology down, removing containers and volumes.
    pub async fn teardown(&self) -> Result<(), ComposeError> {
        self.compose(&["down", "-v", "--remove-orphans"]).await?;
        Ok(())
    }

    /// Run `docker compose` against this project.
    async fn compose(&self, args: &[&str]) -> Result<String, ComposeError> {
        let output = tokio::process::Command::new("docker")
            .arg("compose")
            .arg("-f")
            .arg(&self.compose_file)
            .args(["-p", self.project_name.as_str()])
            .args(args)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ComposeError::Compose(format!(
                "docker compose {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    async fn zones(&self) -> Result<Vec<Zone>, ComposeError> {
        let services = self.compose(&["config", "--services"]).await?;
        Ok(parse_zones(&services, &self.zone_prefix))
    }

    async fn scale(&self, per_zone: u32) -> Result<(), ComposeError> {
        let zones = self.zones().await?;
        let scale = scale_args(&zones, per_zone);
        let mut args = vec!["up", "-d", "--no-recreate"];
        args.extend(scale.iter().map(String::as_str));
        self.compose(&args).await?;
        Ok(())
    }

    async fn running_nodes(&self) -> Result<Vec<Node>, ComposeError> {
        let options = ListContainersOptions::<String> {
            all: false,
            filters: node_filters(&self.project_name),
            ..Default::default()
        };
        let summaries = self.docker.list_containers(Some(options)).await?;
        Ok(nodes_from_summaries(&summaries))
    }

    async fn relist(&self) -> Result<(), ComposeError> {
        let nodes = self.running_nodes().await?;
        debug!(nodes = nodes.len(), "node registry refreshed");
        self.registry().nodes = nodes;
        Ok(())
    }

    async fn container_ready(&self, id: &str) -> Result<bool, ComposeError> {
        let inspect = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await?;
        Ok(inspect.state.as_ref().is_some_and(is_ready))
    }

    // ========================================================================
    // Applications
    // ========================================================================

    async fn app_containers(&self, app_key: &str) -> Result<Vec<(String, bool)>, ComposeError> {
        let options = ListContainersOptions::<String> {
            all: true,
            filters: app_filters(&self.project_name, app_key),
            ..Default::default()
        };
        let summaries = self.docker.list_containers(Some(options)).await?;
        Ok(summaries
            .into_iter()
            .filter_map(|s| {
                let running = s.state.as_deref() == Some("running");
                s.id.map(|id| (id, running))
            })
            .collect())
    }

    /// Last lines of a container's logs, for error reports.
    async fn log_tail(&self, id: &str) -> String {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: false,
            tail: LOG_TAIL_LINES.to_string(),
            ..Default::default()
        };

        let mut log_stream = self.docker.logs(id, Some(options));
        let mut logs = String::new();

        while let Some(Ok(log_output)) = log_stream.next().await {
            logs.push_str(&log_output.to_string());
        }

        logs
    }
}

impl std::fmt::Debug for ComposeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposeCluster")
            .field("compose_file", &self.compose_file)
            .field("project_name", &self.project_name)
            .field("zone_prefix", &self.zone_prefix)
            .finish_non_exhaustive()
    }
}

/// Run `fut` with a deadline.
async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T, ComposeError>
where
    F: Future<Output = Result<T, ComposeError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| ComposeError::Timeout(timeout))?
}

#[async_trait]
impl Autoscaler for ComposeCluster {
    async fn set_cluster_size(
        &self,
        per_zone_count: u32,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        with_timeout(timeout, self.scale(per_zone_count)).await?;
        self.registry().desired_per_zone = Some(per_zone_count);
        info!(per_zone = per_zone_count, "compose services scaled");
        Ok(())
    }

    async fn get_cluster_size(&self) -> Result<u32, DriverError> {
        let nodes = self.running_nodes().await?;
        Ok(u32::try_from(nodes.len()).unwrap_or(u32::MAX))
    }

    async fn get_zones(&self) -> Result<Vec<Zone>, DriverError> {
        Ok(self.zones().await?)
    }
}

#[async_trait]
impl NodeLifecycle for ComposeCluster {
    async fn delete_node(&self, node: &Node, timeout: Duration) -> Result<(), DriverError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        with_timeout(timeout, async {
            match self
                .docker
                .remove_container(node.id.as_str(), Some(options))
                .await
            {
                Ok(()) => Ok(()),
                // Removed by an earlier cycle working from the same snapshot.
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                }) => {
                    debug!(node = %node.id, "node already gone");
                    Ok(())
                }
                Err(e) => Err(ComposeError::from(e)),
            }
        })
        .await?;
        Ok(())
    }

    async fn list_fault_candidate_nodes(&self) -> Vec<Node> {
        self.registry()
            .nodes
            .iter()
            .filter(|n| n.storage_driver_installed)
            .cloned()
            .collect()
    }

    async fn reboot_node(&self, node: &Node, opts: RebootOptions) -> Result<(), DriverError> {
        // Grace period before SIGKILL; a forced reboot skips it.
        let t = if opts.force { 0 } else { 10 };
        with_timeout(opts.command_timeout, async {
            self.docker
                .restart_container(node.id.as_str(), Some(RestartContainerOptions { t }))
                .await
                .map_err(ComposeError::from)
        })
        .await?;
        Ok(())
    }

    async fn wait_node_ready(&self, node: &Node, timeout: Duration) -> Result<(), DriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.container_ready(node.id.as_str()).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => debug!(node = %node.id, error = %e, "node not inspectable yet"),
            }
            if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
                return Err(DriverError::Timeout(timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl RegistryRefresh for ComposeCluster {
    async fn refresh_scheduler_nodes(&self) -> Result<(), DriverError> {
        let desired = self.registry().desired_per_zone;
        if let Some(per_zone) = desired {
            // Replace removed replicas like an autoscaling group would.
            self.scale(per_zone).await?;
        }
        self.relist().await?;
        Ok(())
    }

    async fn refresh_driver_endpoints(&self) -> Result<(), DriverError> {
        let nodes = self.running_nodes().await?;
        let endpoints: Vec<NodeId> = nodes
            .into_iter()
            .filter(|n| n.storage_driver_installed)
            .map(|n| n.id)
            .collect();
        debug!(endpoints = endpoints.len(), "driver endpoints refreshed");
        self.registry().endpoints = endpoints;
        Ok(())
    }
}

#[async_trait]
impl ContextValidator for ComposeCluster {
    async fn validate_context(&self, ctx: &TestContext) -> Result<(), DriverError> {
        let containers = self.app_containers(&ctx.app_key).await?;
        if containers.is_empty() {
            return Err(DriverError::NotFound(format!(
                "no containers labelled for app {}",
                ctx.app_key
            )));
        }

        if let Some((id, _)) = containers.iter().find(|(_, running)| !running) {
            let logs = self.log_tail(id).await;
            return Err(DriverError::Validation(format!(
                "container {} of {} is not running: {}",
                id.chars().take(12).collect::<String>(),
                ctx,
                logs.trim()
            )));
        }
        Ok(())
    }

    async fn tear_down_context(
        &self,
        ctx: &TestContext,
        opts: TeardownOptions,
    ) -> Result<(), DriverError> {
        for (id, _) in self.app_containers(&ctx.app_key).await? {
            let options = RemoveContainerOptions {
                force: true,
                v: true,
                ..Default::default()
            };
            match self.docker.remove_container(&id, Some(options)).await {
                Ok(()) => {}
                // Another context of the same app removed it already.
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                }) => {}
                Err(e) => return Err(ComposeError::from(e).into()),
            }
        }

        if opts.wait_for_resource_leak_cleanup {
            with_timeout(LEAK_CLEANUP_TIMEOUT, async {
                while !self.app_containers(&ctx.app_key).await?.is_empty() {
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Ok::<(), ComposeError>(())
            })
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterSizeOracle for ComposeCluster {
    async fn validate_cluster_size(&self, expected: u32) -> Result<(), DriverError> {
        let registry = self.registry();
        let result = assert_cluster_size(expected, &registry.nodes);
        if result.passed {
            Ok(())
        } else {
            warn!(
                details = result.failure_details.as_deref().unwrap_or_default(),
                "cluster size check failed"
            );
            Err(DriverError::SizeMismatch {
                expected,
                observed: u32::try_from(registry.nodes.len()).unwrap_or(u32::MAX),
            })
        }
    }
}
