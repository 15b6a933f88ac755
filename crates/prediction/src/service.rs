//! The prediction service seam and its error type.

use async_trait::async_trait;
use selfie_core::generation::GenerationRequest;
use selfie_core::job::Job;

/// Errors from the prediction service layer.
#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Prediction API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response that could not be understood.
    #[error("Invalid prediction response: {0}")]
    Decode(String),

    /// The operation cannot be performed for this job.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl PredictionError {
    /// Whether retrying the same call later may succeed.
    ///
    /// Network failures, rate limiting (429) and server errors (5xx) are
    /// transient; client errors and undecodable bodies are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => !e.is_decode() && !e.is_builder(),
            Self::ApiError { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) | Self::InvalidRequest(_) => false,
        }
    }
}

/// Client for a long-running prediction service.
#[async_trait]
pub trait PredictionService: Send + Sync {
    /// Create a job for `request`.
    async fn submit(&self, request: &GenerationRequest) -> Result<Job, PredictionError>;

    /// Fetch the current snapshot of `job`.
    ///
    /// A job whose status is `failed` is returned as `Ok`; only transport
    /// and protocol problems are errors.
    async fn fetch_status(&self, job: &Job) -> Result<Job, PredictionError>;

    /// Ask the service to stop working on `job`.
    async fn cancel(&self, job: &Job) -> Result<(), PredictionError>;
}
