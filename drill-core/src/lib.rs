//! # drill-core
//!
//! Pure logic for stormdrill (no I/O, instant tests).
//!
//! This crate implements the decisions a resilience campaign makes
//! without touching a cluster, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`schedule`] turns scheduler events into the next state plus actions
//! - [`sizing`] computes per-zone targets for the autoscaler
//! - [`selector`] picks fault victims from a candidate snapshot
//! - [`assertions`] checks observed cluster state against expectations
//!
//! The actual I/O (autoscaler calls, node deletion, timers) is performed by
//! `drill-runner`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assertions;
pub mod schedule;
pub mod selector;
pub mod sizing;

pub use assertions::{assert_cluster_size, assert_zone_balance, AssertionResult};
pub use schedule::{Action, Event, SchedulerState, StopReason};
pub use selector::{SeededSelector, VictimSelector, WallClockSelector};
pub use sizing::ClusterTarget;
