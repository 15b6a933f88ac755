//! Bounded, cancellable job polling.
//!
//! [`JobPoller::poll_to_completion`] waits a fixed interval between status
//! reads until the job reaches a terminal state. The loop is bounded by an
//! attempt count and a wall-clock deadline that also cuts short a pending
//! sleep or read. Transient fetch errors are retried with exponential
//! backoff, and the loop returns as soon as the [`CancellationToken`]
//! fires. Once a terminal status is observed no
//! further reads are issued.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use selfie_core::error::CoreError;
use selfie_core::job::Job;

use crate::backoff::{next_delay, BackoffConfig};
use crate::service::{PredictionError, PredictionService};

/// Polling limits and timings.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between successful status reads.
    pub interval: Duration,
    /// Maximum number of status reads (successful or not).
    pub max_attempts: u32,
    /// Wall-clock budget measured from the start of polling.
    pub max_elapsed: Duration,
    /// Consecutive transient failures tolerated before giving up.
    pub max_transient_retries: u32,
    /// Backoff applied between retries of transient failures.
    pub backoff: BackoffConfig,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 150,
            max_elapsed: Duration::from_secs(300),
            max_transient_retries: 5,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Why polling stopped before the job reached a terminal state.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The caller abandoned the job.
    #[error("Polling cancelled")]
    Cancelled,

    /// The attempt or time budget ran out.
    #[error("Job {job_id} did not finish after {attempts} polls ({}s)", .elapsed.as_secs())]
    TimedOut {
        job_id: String,
        attempts: u32,
        elapsed: Duration,
    },

    /// Transient fetch failures exceeded the retry budget.
    #[error("Gave up after {failures} consecutive transient errors: {source}")]
    Transient {
        failures: u32,
        #[source]
        source: PredictionError,
    },

    /// A fetch failed in a way retrying cannot fix.
    #[error("Status fetch failed: {0}")]
    Fetch(#[source] PredictionError),

    /// The service reported something the job state machine refuses.
    #[error(transparent)]
    State(#[from] CoreError),
}

/// Drives submitted jobs to a terminal state.
pub struct JobPoller {
    service: Arc<dyn PredictionService>,
    config: PollConfig,
}

impl JobPoller {
    pub fn new(service: Arc<dyn PredictionService>, config: PollConfig) -> Self {
        Self { service, config }
    }

    /// Poll `job` until it is terminal, the budget is exhausted, or
    /// `cancel` fires.
    ///
    /// A job that is already terminal is returned without any read.
    pub async fn poll_to_completion(
        &self,
        mut job: Job,
        cancel: &CancellationToken,
    ) -> Result<Job, PollError> {
        self.poll(&mut job, cancel).await?;
        Ok(job)
    }

    /// Like [`poll_to_completion`](Self::poll_to_completion), but updates
    /// `job` in place so the caller still holds the last observed snapshot
    /// when polling fails. No sleep or read runs past `max_elapsed`.
    pub async fn poll(&self, job: &mut Job, cancel: &CancellationToken) -> Result<(), PollError> {
        if job.is_terminal() {
            return Ok(());
        }

        let started = Instant::now();
        let deadline = started + self.config.max_elapsed;
        let mut attempts = 0u32;
        let mut failures = 0u32;
        let mut wait = self.config.interval;
        let mut retry_delay = self.config.backoff.initial_delay;

        loop {
            if attempts >= self.config.max_attempts {
                return Err(self.timed_out(job, attempts, started));
            }

            // Wait before the next read, respecting cancellation.
            let wake = (Instant::now() + wait).min(deadline);
            tokio::select! {
                _ = cancel.cancelled() => return Err(self.cancelled(job, attempts)),
                _ = tokio::time::sleep_until(wake) => {}
            }
            if Instant::now() >= deadline {
                return Err(self.timed_out(job, attempts, started));
            }

            attempts += 1;
            let fetched = tokio::select! {
                _ = cancel.cancelled() => return Err(self.cancelled(job, attempts)),
                result = tokio::time::timeout_at(deadline, self.service.fetch_status(job)) => match result {
                    Ok(fetched) => fetched,
                    Err(_) => return Err(self.timed_out(job, attempts, started)),
                },
            };

            match fetched {
                Ok(snapshot) => {
                    failures = 0;
                    wait = self.config.interval;
                    retry_delay = self.config.backoff.initial_delay;

                    if job.apply(snapshot)? {
                        tracing::info!(
                            job_id = %job.id,
                            status = %job.status,
                            attempt = attempts,
                            "Job status changed",
                        );
                    } else {
                        tracing::debug!(job_id = %job.id, status = %job.status, attempt = attempts, "Job still pending");
                    }

                    if job.is_terminal() {
                        return Ok(());
                    }
                }
                Err(e) if e.is_transient() => {
                    failures += 1;
                    if failures > self.config.max_transient_retries {
                        tracing::error!(
                            job_id = %job.id,
                            failures,
                            error = %e,
                            "Status fetch retry budget exhausted",
                        );
                        return Err(PollError::Transient {
                            failures,
                            source: e,
                        });
                    }
                    tracing::warn!(
                        job_id = %job.id,
                        attempt = attempts,
                        delay_ms = retry_delay.as_millis() as u64,
                        error = %e,
                        "Transient status fetch failure, backing off",
                    );
                    wait = retry_delay;
                    retry_delay = next_delay(retry_delay, &self.config.backoff);
                }
                Err(e) => {
                    tracing::error!(job_id = %job.id, error = %e, "Status fetch failed");
                    return Err(PollError::Fetch(e));
                }
            }
        }
    }

    fn timed_out(&self, job: &Job, attempts: u32, started: Instant) -> PollError {
        let elapsed = started.elapsed();
        tracing::warn!(
            job_id = %job.id,
            attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            "Polling budget exhausted",
        );
        PollError::TimedOut {
            job_id: job.id.clone(),
            attempts,
            elapsed,
        }
    }

    fn cancelled(&self, job: &Job, attempts: u32) -> PollError {
        tracing::info!(job_id = %job.id, attempts, "Polling cancelled");
        PollError::Cancelled
    }
}
