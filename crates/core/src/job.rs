//! Prediction job lifecycle.
//!
//! A [`Job`] is created when the prediction service accepts a
//! [`GenerationRequest`](crate::generation::GenerationRequest) and is only
//! mutated by applying poll responses through [`Job::apply`], which enforces
//! the forward-only status machine:
//!
//! ```text
//! Queued -> Running -> { Succeeded | Failed | Canceled }
//! ```

use serde::Serialize;

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Upstream job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl JobStatus {
    /// Parse the status string used by the prediction service.
    ///
    /// Returns `None` for statuses this service does not know about.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "starting" | "queued" => Some(Self::Queued),
            "processing" | "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "canceled" | "aborted" => Some(Self::Canceled),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Whether no further transition can occur from this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Running => 1,
            Self::Succeeded | Self::Failed | Self::Canceled => 2,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A unit of work held by the prediction service.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Opaque upstream handle.
    pub id: String,
    /// URL polled for status updates.
    pub status_url: String,
    /// URL accepting a cancellation request, when the service provides one.
    pub cancel_url: Option<String>,
    pub status: JobStatus,
    /// Result URLs; only populated once the job has succeeded.
    pub output: Vec<String>,
    /// Upstream error text for failed jobs.
    pub error: Option<String>,
    pub created_at: Option<Timestamp>,
}

impl Job {
    /// A freshly submitted job with no output.
    pub fn new(id: impl Into<String>, status_url: impl Into<String>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            status_url: status_url.into(),
            cancel_url: None,
            status,
            output: Vec::new(),
            error: None,
            created_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// First output URL of a succeeded job.
    pub fn primary_output(&self) -> Option<&str> {
        if self.status == JobStatus::Succeeded {
            self.output.first().map(String::as_str)
        } else {
            None
        }
    }

    /// Fold a freshly fetched snapshot of this job into `self`.
    ///
    /// Returns `Ok(true)` when the status changed. A terminal job refuses
    /// any further update, and a snapshot for a different job id is
    /// rejected. A snapshot reporting an earlier non-terminal status than
    /// the one already observed is ignored.
    pub fn apply(&mut self, snapshot: Job) -> Result<bool, CoreError> {
        if self.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "job {} is already {}",
                self.id, self.status
            )));
        }
        if snapshot.id != self.id {
            return Err(CoreError::Conflict(format!(
                "status for job {} applied to job {}",
                snapshot.id, self.id
            )));
        }

        if snapshot.status.rank() < self.status.rank() {
            tracing::debug!(
                job_id = %self.id,
                current = %self.status,
                reported = %snapshot.status,
                "Ignoring status regression",
            );
            return Ok(false);
        }

        let changed = snapshot.status != self.status;
        self.status = snapshot.status;
        self.output = if snapshot.status == JobStatus::Succeeded {
            snapshot.output
        } else {
            Vec::new()
        };
        self.error = snapshot.error;
        if snapshot.cancel_url.is_some() {
            self.cancel_url = snapshot.cancel_url;
        }
        if self.created_at.is_none() {
            self.created_at = snapshot.created_at;
        }
        Ok(changed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
