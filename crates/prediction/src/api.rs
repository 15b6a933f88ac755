//! REST client for the prediction service HTTP endpoints.
//!
//! Wraps job creation (`POST /v1/predictions`), status reads
//! (`GET urls.get`) and cancellation (`POST urls.cancel`) using
//! [`reqwest`]. Every call carries the bearer token.

use std::time::Duration;

use async_trait::async_trait;
use selfie_core::generation::GenerationRequest;
use selfie_core::job::Job;

use crate::messages::{parse_prediction, CreatePrediction};
use crate::service::{PredictionError, PredictionService};

/// Default timeout for a single HTTP call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the prediction service.
#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    /// Base HTTP URL, e.g. `https://api.replicate.com`.
    pub api_url: String,
    pub api_token: String,
    /// Fixed model version every job runs against.
    pub model_version: String,
    pub request_timeout: Duration,
}

/// HTTP client for a Replicate-compatible prediction service.
pub struct ReplicateApi {
    client: reqwest::Client,
    config: ReplicateConfig,
}

impl ReplicateApi {
    /// Create a new API client with its own connection pool.
    pub fn new(config: ReplicateConfig) -> Result<Self, PredictionError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: ReplicateConfig) -> Self {
        Self { client, config }
    }

    fn predictions_url(&self) -> String {
        format!("{}/v1/predictions", self.config.api_url.trim_end_matches('/'))
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`PredictionError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, PredictionError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(PredictionError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful prediction body into a [`Job`].
    async fn parse_job(response: reqwest::Response) -> Result<Job, PredictionError> {
        let response = Self::ensure_success(response).await?;
        let text = response.text().await?;
        parse_prediction(&text)
    }
}

#[async_trait]
impl PredictionService for ReplicateApi {
    async fn submit(&self, request: &GenerationRequest) -> Result<Job, PredictionError> {
        let body = CreatePrediction::new(&self.config.model_version, request);

        let response = self
            .client
            .post(self.predictions_url())
            .bearer_auth(&self.config.api_token)
            .json(&body)
            .send()
            .await?;
        let job = Self::parse_job(response).await?;

        tracing::info!(
            job_id = %job.id,
            status = %job.status,
            "Prediction submitted",
        );
        Ok(job)
    }

    async fn fetch_status(&self, job: &Job) -> Result<Job, PredictionError> {
        let response = self
            .client
            .get(&job.status_url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        Self::parse_job(response).await
    }

    async fn cancel(&self, job: &Job) -> Result<(), PredictionError> {
        let url = job.cancel_url.as_deref().ok_or_else(|| {
            PredictionError::InvalidRequest(format!("job {} has no cancel URL", job.id))
        })?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        Self::ensure_success(response).await?;

        tracing::info!(job_id = %job.id, "Prediction cancel requested");
        Ok(())
    }
}
