//! End-to-end generation sequencing.
//!
//! ```text
//! upload source -> submit job -> poll to terminal -> re-host output
//!        \______________ delete source upload (always) ___________/
//! ```
//!
//! Once the source upload succeeds, [`Orchestrator::generate`] deletes it
//! exactly once on every exit path: success, job failure, submission
//! failure, poll timeout and cancellation. The delete always runs after the
//! job is terminal or has been abandoned, never while the prediction
//! service may still be reading the image.
//!
//! A semaphore bounds how many jobs are in flight at the prediction
//! service at once.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use selfie_core::asset::{generated_folder, StoredAsset};
use selfie_core::generation::{GenerationRequest, RenderingParameters};
use selfie_core::job::{Job, JobStatus};
use selfie_media::store::{DeleteOutcome, MediaStore, UploadSource};
use selfie_prediction::poller::{JobPoller, PollConfig};
use selfie_prediction::service::PredictionService;

use crate::error::GenerationError;

/// Default number of jobs allowed in flight at the prediction service.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Media store folder receiving source uploads.
    pub folder: String,
    /// Copy the upstream result into the media store before returning it.
    pub rehost_output: bool,
    pub max_concurrent_jobs: usize,
    pub parameters: RenderingParameters,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            folder: "selfies".to_string(),
            rehost_output: true,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            parameters: RenderingParameters::default(),
        }
    }
}

/// The user's photo as received from the client.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub data: Vec<u8>,
    pub file_name: String,
}

/// A finished generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutput {
    /// URL of the generated image.
    pub url: String,
    /// Whether `url` points at the media store rather than the upstream
    /// (expiring) result.
    pub rehosted: bool,
    pub job_id: String,
}

/// Sequences uploads, predictions and cleanup for one generation at a time
/// per call. Safe to share across requests behind an `Arc`.
pub struct Orchestrator {
    media: Arc<dyn MediaStore>,
    predictions: Arc<dyn PredictionService>,
    poller: JobPoller,
    permits: Semaphore,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        media: Arc<dyn MediaStore>,
        predictions: Arc<dyn PredictionService>,
        poll_config: PollConfig,
        config: OrchestratorConfig,
    ) -> Self {
        let poller = JobPoller::new(Arc::clone(&predictions), poll_config);
        Self {
            media,
            predictions,
            poller,
            permits: Semaphore::new(config.max_concurrent_jobs.max(1)),
            config,
        }
    }

    /// Number of jobs currently holding a concurrency permit.
    pub fn in_flight(&self) -> usize {
        self.config.max_concurrent_jobs.max(1) - self.permits.available_permits()
    }

    /// Run the full pipeline for raw image bytes.
    pub async fn generate(
        &self,
        source: SourceImage,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutput, GenerationError> {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("generation", %run_id);

        async move {
            let upload = UploadSource::Bytes {
                data: source.data,
                file_name: source.file_name,
            };
            let asset = self
                .media
                .upload(upload, &self.config.folder)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Source upload failed");
                    GenerationError::Upload(e)
                })?;

            let result = self.render(&asset.public_url, cancel).await;
            self.cleanup(&asset).await;
            result
        }
        .instrument(span)
        .await
    }

    /// Run the pipeline for an image the caller already uploaded.
    ///
    /// The source asset is not owned by the pipeline, so nothing is
    /// deleted afterwards.
    pub async fn generate_from_url(
        &self,
        source_url: &str,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutput, GenerationError> {
        let run_id = uuid::Uuid::new_v4();
        self.render(source_url, cancel)
            .instrument(tracing::info_span!("generation", %run_id))
            .await
    }

    // ---- private helpers ----

    /// Submit, poll and re-host. Never touches the source asset.
    async fn render(
        &self,
        source_url: &str,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutput, GenerationError> {
        let request = GenerationRequest::new(source_url, self.config.parameters.clone())?;

        let permit = tokio::select! {
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            permit = self.permits.acquire() => permit.map_err(|_| GenerationError::Cancelled)?,
        };
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        // Submission is not raced against cancellation: an interrupted
        // submit could leave a job upstream whose id we never learn.
        let mut job = self.predictions.submit(&request).await.map_err(|e| {
            tracing::error!(error = %e, "Prediction submission failed");
            GenerationError::Submission(e)
        })?;
        tracing::info!(job_id = %job.id, status = %job.status, "Prediction job created");

        if let Err(e) = self.poller.poll(&mut job, cancel).await {
            tracing::warn!(job_id = %job.id, status = %job.status, error = %e, "Abandoning prediction job");
            self.abandon(&job).await;
            return Err(e.into());
        }
        // The permit bounds upstream jobs only; re-hosting runs without it.
        drop(permit);

        match job.status {
            JobStatus::Succeeded => {
                let output = job.primary_output().ok_or_else(|| GenerationError::EmptyOutput {
                    job_id: job.id.clone(),
                })?;
                Ok(self.rehost(output, &job.id).await)
            }
            status => {
                tracing::warn!(
                    job_id = %job.id,
                    %status,
                    reason = job.error.as_deref().unwrap_or("none"),
                    "Prediction job did not succeed",
                );
                Err(GenerationError::GenerationFailed {
                    job_id: job.id,
                    status,
                    reason: job.error,
                })
            }
        }
    }

    /// Copy the upstream result into the media store, falling back to the
    /// upstream URL when that fails.
    async fn rehost(&self, output_url: &str, job_id: &str) -> GenerationOutput {
        let raw = GenerationOutput {
            url: output_url.to_string(),
            rehosted: false,
            job_id: job_id.to_string(),
        };
        if !self.config.rehost_output {
            return raw;
        }

        let folder = generated_folder(&self.config.folder);
        match self
            .media
            .upload(UploadSource::RemoteUrl(output_url.to_string()), &folder)
            .await
        {
            Ok(asset) => GenerationOutput {
                url: asset.public_url,
                rehosted: true,
                job_id: job_id.to_string(),
            },
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Re-hosting output failed, returning upstream URL");
                raw
            }
        }
    }

    /// Best-effort upstream cancellation of a job we stopped polling, using
    /// the cancel URL from the latest snapshot.
    async fn abandon(&self, job: &Job) {
        if job.cancel_url.is_none() {
            return;
        }
        if let Err(e) = self.predictions.cancel(job).await {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to cancel prediction job");
        }
    }

    /// Delete the transient source upload. Failures are logged only.
    async fn cleanup(&self, asset: &StoredAsset) {
        match self.media.delete(&asset.storage_id).await {
            Ok(DeleteOutcome::Deleted) => {
                tracing::info!(storage_id = %asset.storage_id, "Source upload deleted");
            }
            Ok(DeleteOutcome::NotFound) => {
                tracing::debug!(storage_id = %asset.storage_id, "Source upload already gone");
            }
            Err(e) => {
                tracing::warn!(
                    storage_id = %asset.storage_id,
                    error = %e,
                    "Failed to delete source upload",
                );
            }
        }
    }
}
