//! Identity types for cluster nodes, zones and application contexts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a cluster node as reported by the node-lifecycle driver.
///
/// Opaque to the harness: a cloud instance ID, a container ID, or a
/// generated name in the mock cluster.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Create a NodeId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Container IDs are 64 hex chars; the short form is enough for logs.
        let short: String = self.0.chars().take(12).collect();
        write!(f, "NodeId({})", short)
    }
}

/// A failure domain across which the autoscaler places capacity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Zone(String);

impl Zone {
    /// Create a zone from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the zone name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cluster node eligible (or not) for fault injection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    /// Stable identifier used for lifecycle calls.
    pub id: NodeId,
    /// Human-readable name (hostname or container name).
    pub name: String,
    /// Zone the node lives in.
    pub zone: Zone,
    /// Whether the storage driver runs on this node.
    pub storage_driver_installed: bool,
}

impl Node {
    /// Create a storage node in the given zone.
    pub fn storage(id: impl Into<String>, name: impl Into<String>, zone: Zone) -> Self {
        Self {
            id: NodeId::new(id),
            name: name.into(),
            zone,
            storage_driver_installed: true,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.zone)
    }
}

/// Handle to one deployed application instance.
///
/// Created by whoever deploys the workload; the harness only validates
/// and tears it down.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestContext {
    /// Unique identifier for this deployment.
    pub id: uuid::Uuid,
    /// Application key the context was deployed from.
    pub app_key: String,
    /// Namespace / instance label, e.g. `kill-random-nodes-0`.
    pub namespace: String,
}

impl TestContext {
    /// Create a new context for an application deployed under `namespace`.
    pub fn new(app_key: &str, namespace: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            app_key: app_key.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for TestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.app_key)
    }
}
