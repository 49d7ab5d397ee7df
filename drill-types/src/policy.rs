//! Campaign knobs: retry policy, chaos level and run budget.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::DrillError;

/// Smallest interval the retry executor will sleep between attempts.
pub const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Timeout and interval for one retry-driven operation.
///
/// Immutable once built. The interval is clamped to [`MIN_RETRY_INTERVAL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    timeout: Duration,
    interval: Duration,
}

impl RetryPolicy {
    /// Policy used for autoscaler resize calls: 60 minutes, every 2 minutes.
    pub const SCALE: Self = Self {
        timeout: Duration::from_secs(60 * 60),
        interval: Duration::from_secs(2 * 60),
    };

    /// Create a new policy.
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval: interval.max(MIN_RETRY_INTERVAL),
        }
    }

    /// Overall budget for all attempts.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Delay between attempts.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Upper bound on the number of attempts: `ceil(timeout / interval)`,
    /// never less than one because the first attempt is unconditional.
    pub fn max_attempts(&self) -> u64 {
        let timeout = self.timeout.as_nanos();
        let interval = self.interval.as_nanos();
        let attempts = timeout.div_ceil(interval).max(1);
        u64::try_from(attempts).unwrap_or(u64::MAX)
    }
}

/// Discrete chaos intensity, 1 (gentle) to 5 (aggressive).
///
/// Out-of-range values are accepted and fall back to the default cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChaosLevel(u8);

impl ChaosLevel {
    /// Cadence used for levels outside 1..=5.
    pub const DEFAULT_FREQUENCY_MINS: u64 = 30;

    /// Wrap a raw level without validation.
    pub fn new(level: u8) -> Self {
        Self(level)
    }

    /// Raw level value.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Minutes between fault cycles for this level.
    pub fn frequency_minutes(&self) -> u64 {
        match self.0 {
            5 => 15,
            4 => 30,
            3 => 45,
            2 => 60,
            1 => 90,
            _ => Self::DEFAULT_FREQUENCY_MINS,
        }
    }

    /// Time between fault cycles for this level.
    pub fn frequency(&self) -> Duration {
        Duration::from_secs(self.frequency_minutes() * 60)
    }
}

impl Default for ChaosLevel {
    fn default() -> Self {
        Self(4)
    }
}

/// How a scheduler invocation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Exactly one fault cycle, then validation and teardown.
    OneShot,
    /// One immediate cycle, then one per `frequency` until `total_run` elapses.
    Periodic {
        /// Ticker period.
        frequency: Duration,
        /// Deadline measured from the end of the first cycle.
        total_run: Duration,
    },
}

/// Cadence and total run time for a chaos campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChaosBudget {
    /// Time between fault cycles.
    pub frequency: Duration,
    /// Total run time; zero means "run once".
    pub total_run: Duration,
}

impl ChaosBudget {
    /// Derive the budget from a chaos level and a run time in minutes.
    pub fn from_level(level: ChaosLevel, total_run_minutes: u64) -> Self {
        Self {
            frequency: level.frequency(),
            total_run: Duration::from_secs(total_run_minutes.saturating_mul(60)),
        }
    }

    /// Which mode this budget selects.
    pub fn mode(&self) -> RunMode {
        if self.total_run.is_zero() {
            RunMode::OneShot
        } else {
            RunMode::Periodic {
                frequency: self.frequency,
                total_run: self.total_run,
            }
        }
    }
}

/// What a fault cycle does to the victim node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultKind {
    /// Delete the node and wait for the autoscaler to replace it.
    #[default]
    Delete,
    /// Reboot the node and wait for it to come back.
    Reboot,
}

impl FaultKind {
    /// Get the kind as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::Delete => "delete",
            FaultKind::Reboot => "reboot",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaultKind {
    type Err = DrillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delete" | "kill" => Ok(FaultKind::Delete),
            "reboot" => Ok(FaultKind::Reboot),
            other => Err(DrillError::UnknownFault(other.to_string())),
        }
    }
}

/// Options for a node reboot issued by the node-lifecycle driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebootOptions {
    /// Reboot without draining.
    pub force: bool,
    /// Timeout for the reboot command itself.
    pub command_timeout: Duration,
    /// Delay between command retries.
    pub command_retry: Duration,
}

impl Default for RebootOptions {
    fn default() -> Self {
        Self {
            force: true,
            command_timeout: Duration::from_secs(60),
            command_retry: Duration::from_secs(5),
        }
    }
}

/// Options forwarded to context teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownOptions {
    /// Wait until the driver reports no leaked resources.
    pub wait_for_resource_leak_cleanup: bool,
}

impl Default for TeardownOptions {
    fn default() -> Self {
        Self {
            wait_for_resource_leak_cleanup: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chaos_level_frequency_table() {
        let expected = [(5, 15), (4, 30), (3, 45), (2, 60), (1, 90)];
        for (level, mins) in expected {
            assert_eq!(ChaosLevel::new(level).frequency_minutes(), mins);
        }
    }

    #[test]
    fn chaos_level_out_of_range_uses_default() {
        assert_eq!(ChaosLevel::new(0).frequency_minutes(), 30);
        assert_eq!(ChaosLevel::new(9).frequency(), Duration::from_secs(30 * 60));
    }

    #[test]
    fn zero_run_time_is_one_shot() {
        let budget = ChaosBudget::from_level(ChaosLevel::new(5), 0);
        assert_eq!(budget.mode(), RunMode::OneShot);
    }

    #[test]
    fn nonzero_run_time_is_periodic() {
        let budget = ChaosBudget::from_level(ChaosLevel::new(5), 120);
        assert_eq!(
            budget.mode(),
            RunMode::Periodic {
                frequency: Duration::from_secs(15 * 60),
                total_run: Duration::from_secs(120 * 60),
            }
        );
    }

    #[test]
    fn retry_policy_max_attempts_is_ceiling() {
        assert_eq!(RetryPolicy::SCALE.max_attempts(), 30);
        let policy = RetryPolicy::new(Duration::from_secs(10), Duration::from_secs(3));
        assert_eq!(policy.max_attempts(), 4);
        let policy = RetryPolicy::new(Duration::ZERO, Duration::from_secs(3));
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn retry_policy_clamps_zero_interval() {
        let policy = RetryPolicy::new(Duration::from_secs(1), Duration::ZERO);
        assert_eq!(policy.interval(), MIN_RETRY_INTERVAL);
    }

    #[test]
    fn fault_kind_parse() {
        assert_eq!("delete".parse::<FaultKind>(), Ok(FaultKind::Delete));
        assert_eq!("kill".parse::<FaultKind>(), Ok(FaultKind::Delete));
        assert_eq!("reboot".parse::<FaultKind>(), Ok(FaultKind::Reboot));
        assert!("melt".parse::<FaultKind>().is_err());
    }

    #[test]
    fn fault_kind_serde_lowercase() {
        let json = serde_json::to_string(&FaultKind::Reboot).unwrap();
        assert_eq!(json, "\"reboot\"");
    }
}
