//! Error types for drill-runner.

use crate::config::ConfigError;
use crate::driver::DriverError;
use drill_types::NodeId;

/// Result type for orchestration operations.
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Main error type for orchestration operations.
///
/// Every variant except [`RunnerError::Teardown`] is fatal to the running
/// scenario. Teardown failures are reported but never replace an earlier
/// failure.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Zone topology could not be read.
    #[error("zone lookup failed: {0}")]
    ZoneLookup(#[source] DriverError),

    /// The autoscaler reported no zones.
    #[error("cluster has no zones")]
    NoZones,

    /// Resize still failing when the retry budget ran out.
    #[error("resize to {per_zone} nodes per zone failed: {source}")]
    Resize {
        /// Per-zone count requested.
        per_zone: u32,
        /// Last error returned by the autoscaler.
        source: DriverError,
    },

    /// No node was eligible for fault injection.
    #[error("no fault candidate nodes")]
    NoCandidates,

    /// The fault action against a node failed.
    #[error("fault on node {node} failed: {source}")]
    Fault {
        /// Victim node.
        node: NodeId,
        /// Underlying driver error.
        source: DriverError,
    },

    /// A registry refresh failed.
    #[error("{registry} refresh failed: {source}")]
    RegistryRefresh {
        /// Which registry ("scheduler nodes" or "driver endpoints").
        registry: &'static str,
        /// Underlying driver error.
        source: DriverError,
    },

    /// Observed cluster size did not match after recovery.
    #[error("cluster size validation failed (expected {expected}): {source}")]
    SizeValidation {
        /// Expected node count.
        expected: u32,
        /// Underlying oracle error.
        source: DriverError,
    },

    /// An application context failed validation.
    #[error("context {context} failed validation: {source}")]
    ContextValidation {
        /// Context label (`namespace/app`).
        context: String,
        /// Underlying driver error.
        source: DriverError,
    },

    /// One or more contexts could not be torn down.
    #[error("teardown failed for {failed} context(s)")]
    Teardown {
        /// Number of contexts whose teardown failed.
        failed: usize,
    },

    /// Other driver error.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = RunnerError::RegistryRefresh {
            registry: "scheduler nodes",
            source: DriverError::Unavailable("api down".into()),
        };
        assert_eq!(
            err.to_string(),
            "scheduler nodes refresh failed: backend unavailable: api down"
        );

        let err = RunnerError::Teardown { failed: 2 };
        assert_eq!(err.to_string(), "teardown failed for 2 context(s)");
    }

    #[test]
    fn error_keeps_source() {
        use std::error::Error;
        let err = RunnerError::Fault {
            node: NodeId::new("i-1"),
            source: DriverError::NotFound("i-1".into()),
        };
        assert!(err.source().is_some());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RunnerError>();
    }
}
