//! # drill-types
//!
//! Shared vocabulary for stormdrill resilience campaigns.
//!
//! This crate provides the foundational types used across all stormdrill crates:
//! - [`Node`], [`NodeId`], [`Zone`] - Cluster topology as seen by the harness
//! - [`TestContext`] - Handle to a deployed application instance
//! - [`RetryPolicy`], [`ChaosLevel`], [`ChaosBudget`], [`RunMode`] - Campaign knobs
//! - [`FaultKind`], [`RebootOptions`], [`TeardownOptions`] - Fault and cleanup options
//! - [`DrillError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod policy;

pub use error::DrillError;
pub use ids::{Node, NodeId, TestContext, Zone};
pub use policy::{
    ChaosBudget, ChaosLevel, FaultKind, RebootOptions, RetryPolicy, RunMode, TeardownOptions,
    MIN_RETRY_INTERVAL,
};
