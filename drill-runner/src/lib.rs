//! # drill-runner
//!
//! Async orchestration for stormdrill resilience campaigns.
//!
//! This crate drives a cluster through the collaborator traits in
//! [`driver`] and provides:
//! - [`retry::execute`] - bounded retry-with-timeout for mutating calls
//! - [`ClusterSizeController`] - per-zone resizes and registry refreshes
//! - [`RecoveryValidator`] - fault cycles, context validation, teardown
//! - [`ChaosScheduler`] - fault cycles on a cadence until a deadline
//! - [`scenario`] - the end-to-end scenarios built on top
//!
//! # Example
//!
//! ```no_run
//! use drill_core::WallClockSelector;
//! use stormdrill_runner::{Config, Drivers, MockCluster, Scenario, ScenarioContext};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let drivers = Drivers::from_cluster(Arc::new(MockCluster::new(3, 3)));
//! let scenario = Scenario::KillRandomNodes;
//! let mut ctx = ScenarioContext::new(scenario, &drivers, &config, Box::new(WallClockSelector::new()));
//!
//! scenario.run(&mut ctx).await.into_result()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cluster;
pub mod config;
pub mod driver;
pub mod error;
pub mod recovery;
pub mod retry;
pub mod scenario;
pub mod scheduler;

pub use cluster::ClusterSizeController;
pub use config::{Config, ConfigError};
pub use driver::{
    Autoscaler, ClusterSizeOracle, ContextValidator, DriverError, Drivers, MockCluster,
    NodeLifecycle, RegistryRefresh,
};
pub use error::{Result, RunnerError};
pub use recovery::{RecoveryOptions, RecoveryValidator, TeardownFailure};
pub use retry::Attempt;
pub use scenario::{Scenario, ScenarioContext, ScenarioReport};
pub use scheduler::{CampaignOutcome, ChaosScheduler};
