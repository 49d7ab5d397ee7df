//! Chaos scheduler state machine.
//!
//! This module provides a pure, side-effect-free state machine for one chaos
//! campaign. The state machine takes events as input and produces a new
//! state plus a list of actions to execute.
//!
//! The actual I/O (fault cycles, context validation, timers) is performed by
//! drill-runner, not by this module. The runner executes the actions of one
//! batch in order and stops at the first failing action.
//!
//! ```text
//! Idle ──Start(OneShot)──► RunningOneShot ──RoundCompleted──► TearingDown ──TornDown──► Done
//!   │
//!   └──Start(Periodic)──► RunningPeriodic ◄──Tick / RoundCompleted──┐
//!                               │  └────────────────────────────────┘
//!                               └──DeadlineExpired / RoundFailed──► TearingDown
//! ```

use drill_types::RunMode;
use std::time::Duration;

/// Why a campaign stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// One-shot run finished its single round.
    Completed,
    /// The total run-time budget elapsed.
    Expired,
    /// A fault cycle or context validation failed.
    Failed,
}

/// Scheduler state - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not started.
    Idle,
    /// Running the single round of a one-shot campaign.
    RunningOneShot,
    /// Running rounds on a cadence until the deadline.
    RunningPeriodic {
        /// Rounds completed so far.
        rounds: u32,
    },
    /// Tearing down application contexts.
    TearingDown {
        /// Why the campaign is stopping.
        reason: StopReason,
        /// Rounds completed before stopping.
        rounds: u32,
    },
    /// Terminal state.
    Done {
        /// Why the campaign stopped.
        reason: StopReason,
        /// Rounds completed.
        rounds: u32,
    },
}

/// Events fed into the state machine by the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Campaign requested in the given mode.
    Start(RunMode),
    /// Every action of the last round succeeded.
    RoundCompleted,
    /// An action of the last round failed.
    RoundFailed,
    /// The periodic ticker fired.
    Tick,
    /// The run-time budget elapsed.
    DeadlineExpired,
    /// Teardown finished (successfully or not; teardown is best-effort).
    TornDown,
}

/// Actions for the runner to execute, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Run one fault-injection-and-recovery cycle.
    RunFaultCycle,
    /// Validate every application context.
    ValidateContexts,
    /// Start the ticker and the one-shot deadline.
    ArmTimers {
        /// Ticker period.
        frequency: Duration,
        /// Deadline from now.
        total_run: Duration,
    },
    /// Stop the ticker (and drop the deadline).
    StopTicker,
    /// Tear down every application context.
    TearDown,
}

impl SchedulerState {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (drill-runner)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // From Idle
            (Self::Idle, Event::Start(RunMode::OneShot)) => (
                Self::RunningOneShot,
                vec![Action::RunFaultCycle, Action::ValidateContexts],
            ),
            (
                Self::Idle,
                Event::Start(RunMode::Periodic {
                    frequency,
                    total_run,
                }),
            ) => (
                Self::RunningPeriodic { rounds: 0 },
                vec![
                    Action::RunFaultCycle,
                    Action::ValidateContexts,
                    Action::ArmTimers {
                        frequency,
                        total_run,
                    },
                ],
            ),

            // From RunningOneShot
            (Self::RunningOneShot, Event::RoundCompleted) => (
                Self::TearingDown {
                    reason: StopReason::Completed,
                    rounds: 1,
                },
                vec![Action::TearDown],
            ),
            (Self::RunningOneShot, Event::RoundFailed) => (
                Self::TearingDown {
                    reason: StopReason::Failed,
                    rounds: 0,
                },
                vec![Action::TearDown],
            ),

            // From RunningPeriodic
            (Self::RunningPeriodic { rounds }, Event::RoundCompleted) => (
                Self::RunningPeriodic {
                    rounds: rounds.saturating_add(1),
                },
                vec![],
            ),
            (Self::RunningPeriodic { rounds }, Event::Tick) => (
                Self::RunningPeriodic { rounds },
                vec![Action::RunFaultCycle, Action::ValidateContexts],
            ),
            // Contexts may be mid-disruption at the deadline: skip validation.
            (Self::RunningPeriodic { rounds }, Event::DeadlineExpired) => (
                Self::TearingDown {
                    reason: StopReason::Expired,
                    rounds,
                },
                vec![Action::StopTicker, Action::TearDown],
            ),
            (Self::RunningPeriodic { rounds }, Event::RoundFailed) => (
                Self::TearingDown {
                    reason: StopReason::Failed,
                    rounds,
                },
                vec![Action::StopTicker, Action::TearDown],
            ),

            // From TearingDown
            (Self::TearingDown { reason, rounds }, Event::TornDown) => {
                (Self::Done { reason, rounds }, vec![])
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if the campaign has finished.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    /// Check if the state waits on the ticker/deadline between rounds.
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::RunningPeriodic { .. })
    }

    /// Rounds completed so far.
    pub fn rounds(&self) -> u32 {
        match self {
            Self::Idle | Self::RunningOneShot => 0,
            Self::RunningPeriodic { rounds }
            | Self::TearingDown { rounds, .. }
            | Self::Done { rounds, .. } => *rounds,
        }
    }
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::new()
    }
}
