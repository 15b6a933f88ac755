//! Generation pipeline errors.

use selfie_core::error::CoreError;
use selfie_core::job::JobStatus;
use selfie_media::store::MediaError;
use selfie_prediction::poller::PollError;
use selfie_prediction::service::PredictionError;

/// Why a generation did not produce an image.
///
/// Cleanup failures never appear here; they are logged and swallowed.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The source image could not be stored. No job was created.
    #[error("Upload failed: {0}")]
    Upload(#[source] MediaError),

    /// The generation request was malformed.
    #[error(transparent)]
    InvalidRequest(#[from] CoreError),

    /// The prediction service refused to create the job.
    #[error("Submission failed: {0}")]
    Submission(#[source] PredictionError),

    /// Polling stopped before the job reached a terminal state.
    #[error("Polling failed: {0}")]
    Poll(#[from] PollError),

    /// The job finished as failed or canceled.
    #[error("Job {job_id} ended {status}")]
    GenerationFailed {
        job_id: String,
        status: JobStatus,
        reason: Option<String>,
    },

    /// The job succeeded but returned no image.
    #[error("Job {job_id} succeeded without output")]
    EmptyOutput { job_id: String },

    /// The caller went away before the job was submitted.
    #[error("Generation cancelled")]
    Cancelled,
}

impl GenerationError {
    /// Short machine-readable category for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Upload(_) => "upload",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Submission(_) => "submission",
            Self::Poll(PollError::Cancelled) | Self::Cancelled => "cancelled",
            Self::Poll(_) => "poll",
            Self::GenerationFailed { .. } => "generation_failed",
            Self::EmptyOutput { .. } => "empty_output",
        }
    }
}
