//! Restart policy for the always-on recognition loop.
//!
//! ```text
//!   Idle ──start──▶ Listening ──end──▶ Restarting{n} ──start──▶ Listening
//!                       │                                    ▲
//!                       └──── result resets n and failures ──┘
//!   any ──breaker / source gone / port closed──▶ Stopped
//! ```

use super::recognizer::RecognitionError;
use crate::settings::{AppSettings, Backoff};
use log::{debug, warn};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Too many consecutive permission or hardware failures.
    CircuitOpen { failures: u32 },
    /// The recognizer will produce no more events.
    SourceClosed,
    /// Nobody is listening on the transcript port.
    PortClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Listening,
    /// Waiting out the backoff before restart number `attempt`.
    Restarting { attempt: u32 },
    Stopped(StopReason),
}

impl ListenerState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, ListenerState::Stopped(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub backoff: Backoff,
    /// `None` restarts forever, whatever the errors.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            backoff: Backoff::None,
            max_consecutive_failures: Some(5),
        }
    }
}

impl RestartPolicy {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            backoff: settings.restart_backoff,
            max_consecutive_failures: settings.max_consecutive_failures,
        }
    }

    /// Restart immediately and never give up.
    pub fn unbounded() -> Self {
        Self {
            backoff: Backoff::None,
            max_consecutive_failures: None,
        }
    }
}

pub struct Supervisor {
    policy: RestartPolicy,
    state: watch::Sender<ListenerState>,
    /// Restarts since the last delivered result; drives the backoff.
    attempt: u32,
    /// Consecutive persistent failures since the last delivered result.
    failures: u32,
    total_restarts: u64,
}

impl Supervisor {
    pub fn new(policy: RestartPolicy) -> Self {
        let (state, _) = watch::channel(ListenerState::Idle);
        Self {
            policy,
            state,
            attempt: 0,
            failures: 0,
            total_restarts: 0,
        }
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    pub fn total_restarts(&self) -> u64 {
        self.total_restarts
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    /// A session started. Ignored once stopped.
    pub fn on_started(&mut self) {
        if !self.state().is_stopped() {
            self.set(ListenerState::Listening);
        }
    }

    /// A result reached the port.
    pub fn on_result(&mut self) {
        self.attempt = 0;
        self.failures = 0;
    }

    /// Count an error against the breaker. Returns the new state.
    pub fn on_error(&mut self, error: &RecognitionError) -> ListenerState {
        // Network blips and silence end the session on their own; restarting fixes them
        if !error.is_persistent() {
            debug!("Supervisor: transient recognition error: {}", error);
            return self.state();
        }
        self.count_failure(error)
    }

    /// A session could not be started at all. Every kind of error counts here,
    /// since no session will ever deliver the result that resets the count.
    pub fn on_start_failed(&mut self, error: &RecognitionError) -> ListenerState {
        self.count_failure(error)
    }

    fn count_failure(&mut self, error: &RecognitionError) -> ListenerState {
        self.failures += 1;
        if let Some(max) = self.policy.max_consecutive_failures {
            if self.failures >= max {
                warn!(
                    "Supervisor: giving up after {} consecutive failures ({})",
                    self.failures, error
                );
                self.stop(StopReason::CircuitOpen {
                    failures: self.failures,
                });
            }
        }
        self.state()
    }

    /// The session ended. Returns the delay before the next start, or `None`
    /// if the listener is stopped.
    pub fn on_end(&mut self) -> Option<Duration> {
        if self.state().is_stopped() {
            return None;
        }
        // `attempt` only resets on a delivered result, so an engine that keeps
        // ending empty sessions climbs the backoff curve
        self.attempt = self.attempt.saturating_add(1);
        self.total_restarts += 1;
        self.set(ListenerState::Restarting {
            attempt: self.attempt,
        });
        Some(self.policy.backoff.delay(self.attempt))
    }

    pub fn stop(&mut self, reason: StopReason) {
        if !self.state().is_stopped() {
            self.set(ListenerState::Stopped(reason));
        }
    }

    fn set(&self, state: ListenerState) {
        self.state.send_replace(state);
    }
}
