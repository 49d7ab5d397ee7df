//! Error types for stormdrill values.

use thiserror::Error;

/// Errors raised when a campaign value cannot be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DrillError {
    /// No nodes are eligible for fault injection.
    #[error("candidate node set is empty")]
    EmptyCandidates,

    /// The cluster reported no failure domains.
    #[error("cluster has no zones")]
    NoZones,

    /// Unknown fault kind name.
    #[error("unknown fault kind: {0}")]
    UnknownFault(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DrillError::UnknownFault("melt".into());
        assert_eq!(err.to_string(), "unknown fault kind: melt");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DrillError>();
    }
}
