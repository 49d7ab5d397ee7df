//! Chaos scheduler: runs fault cycles on a cadence until a deadline.
//!
//! The decisions are made by [`drill_core::SchedulerState`]; this module
//! executes the actions it returns and feeds the outcomes back as events.
//! Two timers drive the periodic mode, a repeating ticker and a one-shot
//! deadline, raced in a single `select!`. Cycles run inline in the loop,
//! so two cycles never overlap and a slow cycle only delays the next tick.
//! The deadline is checked between cycles and never interrupts one.

use crate::error::RunnerError;
use crate::recovery::{RecoveryValidator, TeardownFailure};
use drill_core::{Action, Event, SchedulerState, StopReason};
use drill_types::{ChaosBudget, FaultKind, Node, TestContext};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, info, warn};

/// Shortest ticker period accepted by tokio.
const MIN_TICK: Duration = Duration::from_millis(1);

/// Stand-in for "never" when a timer would overflow the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// How a campaign ended.
#[derive(Debug)]
pub struct CampaignOutcome {
    /// Why the campaign stopped.
    pub reason: StopReason,
    /// Fault cycles that completed (including their context validation).
    pub rounds: u32,
    /// First fatal error, if any.
    pub failure: Option<RunnerError>,
    /// Contexts that could not be torn down.
    pub teardown_failures: Vec<TeardownFailure>,
}

impl CampaignOutcome {
    /// Whether the deadline ended the campaign.
    pub fn expired(&self) -> bool {
        self.reason == StopReason::Expired
    }
}

/// Ticker and deadline of a periodic campaign.
struct CampaignTimers {
    ticker: Interval,
    deadline: Pin<Box<Sleep>>,
    deadline_at: Instant,
}

impl CampaignTimers {
    fn arm(frequency: Duration, total_run: Duration) -> Self {
        let now = Instant::now();
        let period = frequency.max(MIN_TICK);
        let mut ticker = interval_at(after(now, period), period.min(FAR_FUTURE));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let deadline_at = after(now, total_run);
        Self {
            ticker,
            deadline: Box::pin(sleep_until(deadline_at)),
            deadline_at,
        }
    }

    /// Wait for the next tick or the deadline, whichever comes first.
    async fn next(&mut self) -> Event {
        tokio::select! {
            biased;

            _ = &mut self.deadline => Event::DeadlineExpired,
            _ = self.ticker.tick() => {
                // A tick landing on the deadline counts as expiry.
                if Instant::now() >= self.deadline_at {
                    Event::DeadlineExpired
                } else {
                    Event::Tick
                }
            }
        }
    }
}

/// `now + delay`, capped at [`FAR_FUTURE`].
fn after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay.min(FAR_FUTURE)).unwrap_or(now)
}

/// Runs one chaos campaign.
#[derive(Debug, Clone, Copy)]
pub struct ChaosScheduler {
    budget: ChaosBudget,
    fault: FaultKind,
}

impl ChaosScheduler {
    /// Create a scheduler for the given budget and fault kind.
    pub fn new(budget: ChaosBudget, fault: FaultKind) -> Self {
        Self { budget, fault }
    }

    /// Run the campaign to completion.
    ///
    /// The candidate set is read once, here. Whatever happens, every
    /// context is torn down before returning.
    pub async fn run(
        &self,
        recovery: &mut RecoveryValidator,
        contexts: &[TestContext],
    ) -> CampaignOutcome {
        let candidates = recovery.candidates().await;
        info!(
            candidates = candidates.len(),
            frequency_secs = self.budget.frequency.as_secs(),
            total_run_secs = self.budget.total_run.as_secs(),
            fault = %self.fault,
            "starting chaos campaign"
        );

        let mut runner = CampaignRun {
            fault: self.fault,
            recovery,
            contexts,
            candidates: &candidates,
            timers: None,
            failure: None,
            teardown_failures: Vec::new(),
        };

        let mut state = SchedulerState::new();
        let mut pending = VecDeque::from([Event::Start(self.budget.mode())]);

        loop {
            let event = match pending.pop_front() {
                Some(event) => event,
                None if state.is_done() => break,
                None => match runner.timers.as_mut() {
                    Some(timers) => timers.next().await,
                    None => {
                        warn!(?state, "scheduler waiting without timers");
                        break;
                    }
                },
            };

            debug!(?event, "scheduler event");
            let (next, actions) = state.on_event(event);
            state = next;
            pending.extend(runner.execute(actions, state.rounds()).await);
        }

        let (reason, rounds) = match state {
            SchedulerState::Done { reason, rounds } => (reason, rounds),
            other => (StopReason::Failed, other.rounds()),
        };
        info!(?reason, rounds, "chaos campaign finished");

        CampaignOutcome {
            reason,
            rounds,
            failure: runner.failure,
            teardown_failures: runner.teardown_failures,
        }
    }
}

/// Mutable state of one campaign while actions execute.
struct CampaignRun<'a> {
    fault: FaultKind,
    recovery: &'a mut RecoveryValidator,
    contexts: &'a [TestContext],
    candidates: &'a [Node],
    timers: Option<CampaignTimers>,
    failure: Option<RunnerError>,
    teardown_failures: Vec<TeardownFailure>,
}

impl CampaignRun<'_> {
    /// Execute a batch of actions in order and report the resulting events.
    ///
    /// A failing action stops the batch.
    async fn execute(&mut self, actions: Vec<Action>, rounds: u32) -> Vec<Event> {
        let mut events = Vec::new();
        let mut round: Option<bool> = None;

        for action in actions {
            let result = match action {
                Action::RunFaultCycle => {
                    info!(round = rounds + 1, "running fault cycle");
                    round = Some(true);
                    self.recovery
                        .run_fault_cycle(self.fault, self.candidates)
                        .await
                }
                Action::ValidateContexts => self.recovery.validate_contexts(self.contexts).await,
                Action::ArmTimers {
                    frequency,
                    total_run,
                } => {
                    self.timers = Some(CampaignTimers::arm(frequency, total_run));
                    Ok(())
                }
                Action::StopTicker => {
                    self.timers = None;
                    Ok(())
                }
                Action::TearDown => {
                    self.teardown_failures = self.recovery.tear_down_contexts(self.contexts).await;
                    events.push(Event::TornDown);
                    Ok(())
                }
            };

            if let Err(e) = result {
                warn!(error = %e, "round failed");
                self.failure.get_or_insert(e);
                round = Some(false);
                break;
            }
        }

        match round {
            Some(true) => events.push(Event::RoundCompleted),
            Some(false) => events.push(Event::RoundFailed),
            None => {}
        }
        events
    }
}
