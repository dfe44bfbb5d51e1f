//! Health verification types: retry policy, deploy latch, and the
//! verification state machine.
//!
//! This module is intentionally free of I/O and async. The loop that drives
//! these types lives in `application::services::verify`.

use std::time::Duration;

use crate::domain::command::CommandResult;
use crate::domain::error::VerificationTimeout;

// ── Retry policy ──────────────────────────────────────────────────────────────

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Every attempt waits `interval`.
    Fixed,
    /// Attempt `n` waits `interval * factor^n`, capped at `max`.
    Exponential { factor: u32, max: Duration },
}

/// Bounds and success predicate for the deploy/poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_elapsed: Duration,
    pub backoff: Backoff,
    /// Status code that means "service ready".
    pub success_status: u16,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_elapsed: Duration::from_secs(1800),
            backoff: Backoff::Fixed,
            success_status: 200,
        }
    }
}

impl RetryPolicy {
    /// Iteration budget: `max_elapsed / interval`, at least one.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        let interval = self.interval.as_millis();
        if interval == 0 {
            return 1;
        }
        let n = self.max_elapsed.as_millis() / interval;
        u32::try_from(n).unwrap_or(u32::MAX).max(1)
    }

    /// Delay before the poll of attempt `attempt` (zero-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential { factor, max } => self
                .interval
                .saturating_mul(factor.saturating_pow(attempt))
                .min(max),
        }
    }

    #[must_use]
    pub fn is_success(&self, status: u16) -> bool {
        status == self.success_status
    }
}

// ── State machine ─────────────────────────────────────────────────────────────

/// States of one verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyState {
    /// No deploy attempt recorded yet.
    Pending,
    /// The last deploy attempt printed the auth-failure marker. Deploy is
    /// retried on the next iteration and polling continues regardless.
    DeployFailedAuth,
    /// Deploy latched; only polling remains.
    Polling,
    Succeeded,
    TimedOut,
}

/// One-way flag suppressing further deploys once an attempt's output lacks
/// the auth-failure marker.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeployLatch {
    deployed: bool,
    attempts: u32,
    auth_failures: u32,
}

impl DeployLatch {
    #[must_use]
    pub fn should_deploy(&self) -> bool {
        !self.deployed
    }

    /// Record a finished deploy attempt and return the resulting state.
    ///
    /// Only the marker decides: a non-zero exit without the marker still
    /// latches.
    pub fn record(&mut self, result: &CommandResult, auth_failure_marker: &str) -> VerifyState {
        self.attempts += 1;
        if result.contains(auth_failure_marker) {
            self.auth_failures += 1;
            VerifyState::DeployFailedAuth
        } else {
            self.deployed = true;
            VerifyState::Polling
        }
    }

    /// Record an attempt that never produced output (spawn failure, timeout).
    /// Does not latch.
    pub fn record_error(&mut self) -> VerifyState {
        self.attempts += 1;
        VerifyState::Pending
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn auth_failures(&self) -> u32 {
        self.auth_failures
    }
}

// ── Probe results and report ──────────────────────────────────────────────────

/// An HTTP response from the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
}

/// Summary of a finished verification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// `Succeeded` or `TimedOut`.
    pub state: VerifyState,
    /// Loop iterations executed.
    pub attempts: u32,
    pub deploy_attempts: u32,
    /// Deploy attempts whose output contained the auth-failure marker.
    pub auth_failures: u32,
    /// Connection failures plus non-success responses.
    pub non_success_events: u32,
    pub last_status: Option<u16>,
}

impl VerifyReport {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.state == VerifyState::Succeeded
    }

    /// The timeout as an error value, for reporting. `None` on success.
    #[must_use]
    pub fn timeout(&self) -> Option<VerificationTimeout> {
        (self.state == VerifyState::TimedOut).then_some(VerificationTimeout {
            attempts: self.attempts,
            last_status: self.last_status,
        })
    }
}
