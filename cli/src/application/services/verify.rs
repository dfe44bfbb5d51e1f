//! Application service: interleave deploys with health polling until the
//! service answers with the success status or the budget runs out.
//!
//! The deployment tool needs several runs before the server converges, so
//! each iteration re-deploys until one attempt's output lacks the
//! auth-failure marker, then only polls.

use std::time::Duration;

use crate::application::ports::{Deployer, HealthProbe, ProgressReporter, Sleeper};
use crate::domain::{DeployLatch, RetryPolicy, VerifyReport, VerifyState};

/// Longest response body echoed in a non-success report line.
const BODY_PREVIEW_CHARS: usize = 200;

/// Parameters of one verification run.
pub struct VerifyOptions<'a> {
    pub url: &'a str,
    pub policy: &'a RetryPolicy,
    pub auth_failure_marker: &'a str,
}

/// Run the deploy/poll loop.
///
/// Terminates after at most `policy.max_attempts()` iterations, in
/// `Succeeded` on the first success status, else `TimedOut`. Never fails:
/// connection errors and deploy errors are reported and retried.
pub async fn verify(
    deployer: &impl Deployer,
    probe: &impl HealthProbe,
    sleeper: &impl Sleeper,
    reporter: &impl ProgressReporter,
    opts: &VerifyOptions<'_>,
) -> VerifyReport {
    let policy = opts.policy;
    let max_attempts = policy.max_attempts();
    let mut latch = DeployLatch::default();
    let mut state = VerifyState::Pending;
    let mut slept = Duration::ZERO;
    let mut attempts = 0;
    let mut non_success_events = 0;
    let mut last_status = None;

    for attempt in 0..max_attempts {
        if attempt > 0 && slept >= policy.max_elapsed {
            break;
        }
        attempts = attempt + 1;

        if latch.should_deploy() {
            state = match deployer.deploy().await {
                Ok(result) => latch.record(&result, opts.auth_failure_marker),
                Err(e) => {
                    reporter.warn(&format!("deploy failed to run, attempt={attempt}: {e:#}"));
                    latch.record_error()
                }
            };
            if state == VerifyState::DeployFailedAuth {
                reporter.warn(&format!(
                    "deploy could not authenticate, attempt={attempt}; will re-run"
                ));
            }
            tracing::debug!(attempt, ?state, "deploy attempt recorded");
        }

        let delay = policy.delay_for(attempt);
        sleeper.sleep(delay).await;
        slept += delay;

        match probe.get(opts.url).await {
            Err(e) => {
                non_success_events += 1;
                tracing::debug!(attempt, error = %e, "health probe failed");
                reporter.warn(&format!("caught exception, attempt={attempt}, exception={e}"));
            }
            Ok(response) if policy.is_success(response.status) => {
                last_status = Some(response.status);
                state = VerifyState::Succeeded;
                reporter.success(&format!(
                    "got {} status code (attempt={attempt})!",
                    response.status
                ));
                break;
            }
            Ok(response) => {
                non_success_events += 1;
                last_status = Some(response.status);
                reporter.warn(&format!(
                    "got bad status code ({}). attempt={attempt}, content={}",
                    response.status,
                    preview(&response.body)
                ));
            }
        }
    }

    if state != VerifyState::Succeeded {
        state = VerifyState::TimedOut;
    }
    tracing::info!(?state, attempts, deploy_attempts = latch.attempts(), "verification finished");

    VerifyReport {
        state,
        attempts,
        deploy_attempts: latch.attempts(),
        auth_failures: latch.auth_failures(),
        non_success_events,
        last_status,
    }
}

fn preview(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_PREVIEW_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(BODY_PREVIEW_CHARS).collect();
    format!("{cut}…")
}
