#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use selfie_api::config::ServerConfig;
use selfie_api::router::build_app_router;
use selfie_api::state::AppState;
use selfie_core::asset::StoredAsset;
use selfie_core::generation::GenerationRequest;
use selfie_core::job::{Job, JobStatus};
use selfie_media::store::{DeleteOutcome, MediaError, MediaStore, UploadSource};
use selfie_pipeline::orchestrator::Orchestrator;
use selfie_prediction::service::{PredictionError, PredictionService};

pub const MULTIPART_BOUNDARY: &str = "selfie-test-boundary";

/// Build a test `ServerConfig` with fake credentials and a fast poll interval.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::from_lookup(|key| match key {
        "REPLICATE_API_TOKEN" => Some("r8_test".to_string()),
        "CLOUDINARY_CLOUD_NAME" => Some("demo".to_string()),
        "CLOUDINARY_API_KEY" => Some("1234".to_string()),
        "CLOUDINARY_API_SECRET" => Some("secret".to_string()),
        "CLOUDINARY_UPLOAD_PRESET" => Some("preset".to_string()),
        _ => None,
    })
    .expect("test config is complete");
    config.host = "127.0.0.1".to_string();
    config.port = 0;
    config.request_timeout_secs = 30;
    config.poll.interval = Duration::from_millis(10);
    config
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Media store remembering which ids exist.
pub struct FakeMedia {
    pub fail_delete: bool,
    existing: Mutex<HashSet<String>>,
    deleted: Mutex<Vec<String>>,
}

impl FakeMedia {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_delete: false,
            existing: Mutex::new(HashSet::from(["selfies/existing".to_string()])),
            deleted: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_deletes() -> Arc<Self> {
        Arc::new(Self {
            fail_delete: true,
            existing: Mutex::new(HashSet::new()),
            deleted: Mutex::new(Vec::new()),
        })
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaStore for FakeMedia {
    async fn upload(&self, source: UploadSource, folder: &str) -> Result<StoredAsset, MediaError> {
        let name = match &source {
            UploadSource::Bytes { file_name, .. } => file_name.clone(),
            UploadSource::RemoteUrl(url) => url.rsplit('/').next().unwrap_or("out.png").to_string(),
        };
        let storage_id = format!("{folder}/{name}");
        self.existing.lock().unwrap().insert(storage_id.clone());
        Ok(StoredAsset {
            public_url: format!("https://media.test/{storage_id}"),
            storage_id,
        })
    }

    async fn delete(&self, storage_id: &str) -> Result<DeleteOutcome, MediaError> {
        if self.fail_delete {
            return Err(MediaError::ApiError {
                status: 401,
                body: "Invalid signature".into(),
            });
        }
        self.deleted.lock().unwrap().push(storage_id.to_string());
        if self.existing.lock().unwrap().remove(storage_id) {
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::NotFound)
        }
    }
}

/// How every fake prediction job ends.
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Succeed,
    Fail,
    Hang,
}

pub struct FakePredictions {
    outcome: Outcome,
    submitted: Mutex<Vec<String>>,
    cancelled: Mutex<Vec<String>>,
}

impl FakePredictions {
    pub fn new(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            submitted: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        })
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl PredictionService for FakePredictions {
    async fn submit(&self, request: &GenerationRequest) -> Result<Job, PredictionError> {
        self.submitted
            .lock()
            .unwrap()
            .push(request.source_image_url().to_string());
        let mut job = Job::new("p1", "https://api.test/v1/predictions/p1", JobStatus::Queued);
        job.cancel_url = Some("https://api.test/v1/predictions/p1/cancel".to_string());
        Ok(job)
    }

    async fn fetch_status(&self, job: &Job) -> Result<Job, PredictionError> {
        let mut snapshot = Job::new(job.id.clone(), job.status_url.clone(), JobStatus::Running);
        match self.outcome {
            Outcome::Succeed => {
                snapshot.status = JobStatus::Succeeded;
                snapshot.output = vec!["https://replicate.delivery/p1/out.png".to_string()];
            }
            Outcome::Fail => {
                snapshot.status = JobStatus::Failed;
                snapshot.error = Some("CUDA out of memory".to_string());
            }
            Outcome::Hang => {}
        }
        Ok(snapshot)
    }

    async fn cancel(&self, job: &Job) -> Result<(), PredictionError> {
        self.cancelled.lock().unwrap().push(job.id.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// App construction and request helpers
// ---------------------------------------------------------------------------

/// Build the full application router wired to the given fakes.
pub fn build_test_app(
    media: Arc<FakeMedia>,
    predictions: Arc<FakePredictions>,
    shutdown: CancellationToken,
) -> Router {
    let config = test_config();
    let orchestrator = Arc::new(Orchestrator::new(
        media.clone(),
        predictions,
        config.poll.clone(),
        config.pipeline.clone(),
    ));
    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator,
        media,
        shutdown,
    };
    build_app_router(state, &config).expect("test CORS origins are valid")
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_multipart(uri: &str, field: &str, file_name: &str, data: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{MULTIPART_BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
         Content-Type: image/jpeg\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
