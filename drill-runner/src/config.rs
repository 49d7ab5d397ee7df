//! Configuration loading for stormdrill.
//!
//! Configuration is loaded from a TOML file (default: `stormdrill.toml`).
//! Every field has a default, and missing sections fall back to theirs.

use crate::recovery::RecoveryOptions;
use drill_types::{ChaosBudget, ChaosLevel, FaultKind, RebootOptions, RetryPolicy, TeardownOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name.
pub const DEFAULT_CONFIG_PATH: &str = "stormdrill.toml";

/// Root configuration for stormdrill.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Campaign configuration.
    #[serde(default)]
    pub campaign: CampaignConfig,
    /// Retry policy for autoscaler calls.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Recovery timing.
    #[serde(default)]
    pub recovery: RecoveryConfig,
    /// Docker Compose driver configuration.
    #[serde(default)]
    pub docker: DockerConfig,
    /// In-memory cluster configuration.
    #[serde(default)]
    pub mock: MockConfig,
}

/// Campaign configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignConfig {
    /// Chaos level 1-5 (default: 4, one fault every 30 minutes).
    #[serde(default)]
    pub chaos_level: ChaosLevel,
    /// Total run time in minutes; 0 runs a single fault cycle (default: 0).
    #[serde(default)]
    pub total_run_minutes: u64,
    /// Fault injected each cycle (default: delete).
    #[serde(default)]
    pub fault: FaultKind,
    /// Instances of each application to validate (default: 1).
    #[serde(default = "default_scale_factor")]
    pub scale_factor: usize,
    /// Application keys (default: ["postgres"]).
    #[serde(default = "default_apps")]
    pub apps: Vec<String>,
}

/// Retry policy for autoscaler calls.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Overall resize budget in minutes (default: 60).
    #[serde(default = "default_scale_timeout_mins")]
    pub scale_timeout_mins: u64,
    /// Minutes between resize attempts (default: 2).
    #[serde(default = "default_scale_interval_mins")]
    pub scale_interval_mins: u64,
    /// Timeout of a single resize call in minutes (default: 10).
    #[serde(default = "default_scale_call_timeout_mins")]
    pub scale_call_timeout_mins: u64,
}

/// Recovery timing.
#[derive(Debug, Clone, Deserialize)]
pub struct RecoveryConfig {
    /// Wait after a delete for the replacement node (default: 600 = 10 min).
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    /// Node delete timeout (default: 420 = 7 min).
    #[serde(default = "default_node_delete_timeout_secs")]
    pub node_delete_timeout_secs: u64,
    /// Wait after scale-down for storage to recover (default: 1800 = 30 min).
    #[serde(default = "default_storage_recovery_timeout_secs")]
    pub storage_recovery_timeout_secs: u64,
    /// Reboot command timeout (default: 60).
    #[serde(default = "default_reboot_command_timeout_secs")]
    pub reboot_command_timeout_secs: u64,
    /// Delay between reboot command retries (default: 5).
    #[serde(default = "default_reboot_command_retry_secs")]
    pub reboot_command_retry_secs: u64,
    /// How long a rebooted node may take to answer (default: 900 = 15 min).
    #[serde(default = "default_reboot_ready_timeout_secs")]
    pub reboot_ready_timeout_secs: u64,
    /// Wait for leaked resources to be cleaned up on teardown (default: true).
    #[serde(default = "default_wait_for_resource_leak_cleanup")]
    pub wait_for_resource_leak_cleanup: bool,
}

/// Docker Compose driver configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DockerConfig {
    /// Compose file describing the node services (default: docker-compose.yml).
    #[serde(default = "default_compose_file")]
    pub compose_file: PathBuf,
    /// Compose project name (default: stormdrill).
    #[serde(default = "default_project_name")]
    pub project_name: String,
    /// Services whose name starts with this prefix are zones (default: zone).
    #[serde(default = "default_zone_prefix")]
    pub zone_prefix: String,
}

/// In-memory cluster configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MockConfig {
    /// Number of zones (default: 3).
    #[serde(default = "default_mock_zones")]
    pub zones: usize,
    /// Initial nodes per zone (default: 3).
    #[serde(default = "default_mock_nodes_per_zone")]
    pub nodes_per_zone: u32,
}

// Default value functions
fn default_scale_factor() -> usize {
    1
}

fn default_apps() -> Vec<String> {
    vec!["postgres".to_string()]
}

fn default_scale_timeout_mins() -> u64 {
    60
}

fn default_scale_interval_mins() -> u64 {
    2
}

fn default_scale_call_timeout_mins() -> u64 {
    10
}

fn default_settle_secs() -> u64 {
    10 * 60
}

fn default_node_delete_timeout_secs() -> u64 {
    7 * 60
}

fn default_storage_recovery_timeout_secs() -> u64 {
    30 * 60
}

fn default_reboot_command_timeout_secs() -> u64 {
    60
}

fn default_reboot_command_retry_secs() -> u64 {
    5
}

fn default_reboot_ready_timeout_secs() -> u64 {
    15 * 60
}

fn default_wait_for_resource_leak_cleanup() -> bool {
    true
}

fn default_compose_file() -> PathBuf {
    PathBuf::from("docker-compose.yml")
}

fn default_project_name() -> String {
    "stormdrill".to_string()
}

fn default_zone_prefix() -> String {
    "zone".to_string()
}

fn default_mock_zones() -> usize {
    3
}

fn default_mock_nodes_per_zone() -> u32 {
    3
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            chaos_level: ChaosLevel::default(),
            total_run_minutes: 0,
            fault: FaultKind::default(),
            scale_factor: default_scale_factor(),
            apps: default_apps(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            scale_timeout_mins: default_scale_timeout_mins(),
            scale_interval_mins: default_scale_interval_mins(),
            scale_call_timeout_mins: default_scale_call_timeout_mins(),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            settle_secs: default_settle_secs(),
            node_delete_timeout_secs: default_node_delete_timeout_secs(),
            storage_recovery_timeout_secs: default_storage_recovery_timeout_secs(),
            reboot_command_timeout_secs: default_reboot_command_timeout_secs(),
            reboot_command_retry_secs: default_reboot_command_retry_secs(),
            reboot_ready_timeout_secs: default_reboot_ready_timeout_secs(),
            wait_for_resource_leak_cleanup: default_wait_for_resource_leak_cleanup(),
        }
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            compose_file: default_compose_file(),
            project_name: default_project_name(),
            zone_prefix: default_zone_prefix(),
        }
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            zones: default_mock_zones(),
            nodes_per_zone: default_mock_nodes_per_zone(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

impl CampaignConfig {
    /// Cadence and run time for the scheduler.
    pub fn budget(&self) -> ChaosBudget {
        ChaosBudget::from_level(self.chaos_level, self.total_run_minutes)
    }
}

impl RetryConfig {
    /// Retry policy for resize calls.
    pub fn scale_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_secs(self.scale_timeout_mins.saturating_mul(60)),
            Duration::from_secs(self.scale_interval_mins.saturating_mul(60)),
        )
    }

    /// Timeout of a single resize call.
    pub fn scale_call_timeout(&self) -> Duration {
        Duration::from_secs(self.scale_call_timeout_mins.saturating_mul(60))
    }
}

impl RecoveryConfig {
    /// Options for the recovery validator.
    pub fn options(&self) -> RecoveryOptions {
        RecoveryOptions {
            settle: Duration::from_secs(self.settle_secs),
            node_delete_timeout: Duration::from_secs(self.node_delete_timeout_secs),
            reboot: RebootOptions {
                force: true,
                command_timeout: Duration::from_secs(self.reboot_command_timeout_secs),
                command_retry: Duration::from_secs(self.reboot_command_retry_secs),
            },
            reboot_ready_timeout: Duration::from_secs(self.reboot_ready_timeout_secs),
            teardown: TeardownOptions {
                wait_for_resource_leak_cleanup: self.wait_for_resource_leak_cleanup,
            },
        }
    }

    /// Wait after a scale-down for storage to recover.
    pub fn storage_recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_recovery_timeout_secs)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
