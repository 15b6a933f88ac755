//! Prediction service wire types.
//!
//! The service answers both job creation and status reads with the same
//! prediction object:
//!
//! ```json
//! {"id": "...", "status": "processing", "urls": {"get": "...", "cancel": "..."},
//!  "output": null, "error": null, "created_at": "2024-01-01T00:00:00Z"}
//! ```

use serde::{Deserialize, Serialize};

use selfie_core::generation::GenerationRequest;
use selfie_core::job::{Job, JobStatus};
use selfie_core::types::Timestamp;

use crate::service::PredictionError;

/// Body of `POST /v1/predictions`.
#[derive(Debug, Serialize)]
pub struct CreatePrediction<'a> {
    pub version: &'a str,
    pub input: PredictionInput<'a>,
}

/// Model input fields.
#[derive(Debug, Serialize)]
pub struct PredictionInput<'a> {
    pub face_image_path: &'a str,
    pub prompt: &'a str,
    pub negative_prompt: &'a str,
    pub identitynet_strength_ratio: f64,
    pub guidance_scale: f64,
    pub num_inference_steps: u32,
}

impl<'a> CreatePrediction<'a> {
    pub fn new(version: &'a str, request: &'a GenerationRequest) -> Self {
        let params = request.parameters();
        Self {
            version,
            input: PredictionInput {
                face_image_path: request.source_image_url(),
                prompt: &params.prompt,
                negative_prompt: &params.negative_prompt,
                identitynet_strength_ratio: params.identity_strength,
                guidance_scale: params.guidance_scale,
                num_inference_steps: params.num_inference_steps,
            },
        }
    }
}

/// Endpoints attached to a prediction.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionUrls {
    pub get: String,
    #[serde(default)]
    pub cancel: Option<String>,
}

/// A prediction object as returned by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionResponse {
    pub id: String,
    pub status: String,
    pub urls: PredictionUrls,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

impl PredictionResponse {
    /// Convert the wire object into a domain [`Job`].
    pub fn into_job(self) -> Result<Job, PredictionError> {
        let status = JobStatus::from_wire(&self.status).ok_or_else(|| {
            PredictionError::Decode(format!(
                "unknown status '{}' for prediction {}",
                self.status, self.id
            ))
        })?;

        let mut job = Job::new(self.id, self.urls.get, status);
        job.cancel_url = self.urls.cancel;
        job.created_at = self.created_at;
        job.output = self.output.as_ref().map(normalize_output).unwrap_or_default();
        job.error = self.error.and_then(|e| match e {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        });
        Ok(job)
    }
}

/// Flatten a prediction `output` into a list of URLs.
///
/// Models return either a single URL string or an array of them; anything
/// else yields an empty list.
pub fn normalize_output(output: &serde_json::Value) -> Vec<String> {
    match output {
        serde_json::Value::String(url) => vec![url.clone()],
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Parse a raw JSON body into a [`Job`].
pub fn parse_prediction(text: &str) -> Result<Job, PredictionError> {
    let response: PredictionResponse = serde_json::from_str(text)
        .map_err(|e| PredictionError::Decode(e.to_string()))?;
    response.into_job()
}
