//! In-memory fakes for the media store and prediction service.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use selfie_core::asset::StoredAsset;
use selfie_core::generation::GenerationRequest;
use selfie_core::job::{Job, JobStatus};
use selfie_media::store::{DeleteOutcome, MediaError, MediaStore, UploadSource};
use selfie_prediction::service::{PredictionError, PredictionService};

pub const MEDIA_BASE: &str = "https://media.test";

// ---------------------------------------------------------------------------
// Media store
// ---------------------------------------------------------------------------

/// How the fake answers delete calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    Delete,
    NotFound,
    Fail,
}

/// Media store keeping uploads in memory.
///
/// Byte uploads are stored as `{folder}/{file stem}` and served from
/// `{MEDIA_BASE}/{folder}/{file_name}`.
pub struct FakeMediaStore {
    pub fail_uploads: bool,
    pub fail_rehost: bool,
    /// Time each re-host takes.
    pub rehost_delay: Duration,
    pub delete_mode: DeleteMode,
    pub(crate) uploads: Mutex<Vec<String>>,
    pub(crate) rehosted: Mutex<Vec<String>>,
    pub(crate) deleted: Mutex<Vec<String>>,
}

impl Default for FakeMediaStore {
    fn default() -> Self {
        Self {
            fail_uploads: false,
            fail_rehost: false,
            rehost_delay: Duration::ZERO,
            delete_mode: DeleteMode::Delete,
            uploads: Mutex::new(Vec::new()),
            rehosted: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }
}

impl FakeMediaStore {
    /// Storage ids of byte uploads, in order.
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    /// Remote URLs copied into the store.
    pub fn rehosted(&self) -> Vec<String> {
        self.rehosted.lock().unwrap().clone()
    }

    /// Storage ids passed to `delete`, in order.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaStore for FakeMediaStore {
    async fn upload(&self, source: UploadSource, folder: &str) -> Result<StoredAsset, MediaError> {
        match source {
            UploadSource::Bytes { file_name, .. } => {
                if self.fail_uploads {
                    return Err(MediaError::ApiError {
                        status: 400,
                        body: "Upload preset not found".into(),
                    });
                }
                let stem = file_name.split('.').next().unwrap_or(&file_name);
                let storage_id = format!("{folder}/{stem}");
                self.uploads.lock().unwrap().push(storage_id.clone());
                Ok(StoredAsset {
                    public_url: format!("{MEDIA_BASE}/{folder}/{file_name}"),
                    storage_id,
                })
            }
            UploadSource::RemoteUrl(url) => {
                tokio::time::sleep(self.rehost_delay).await;
                if self.fail_rehost {
                    return Err(MediaError::ApiError {
                        status: 502,
                        body: "remote fetch failed".into(),
                    });
                }
                let name = url.rsplit('/').next().unwrap_or("out.png").to_string();
                self.rehosted.lock().unwrap().push(url);
                Ok(StoredAsset {
                    public_url: format!("{MEDIA_BASE}/{folder}/{name}"),
                    storage_id: format!("{folder}/{name}"),
                })
            }
        }
    }

    async fn delete(&self, storage_id: &str) -> Result<DeleteOutcome, MediaError> {
        self.deleted.lock().unwrap().push(storage_id.to_string());
        match self.delete_mode {
            DeleteMode::Delete => Ok(DeleteOutcome::Deleted),
            DeleteMode::NotFound => Ok(DeleteOutcome::NotFound),
            DeleteMode::Fail => Err(MediaError::ApiError {
                status: 500,
                body: "destroy failed".into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Prediction service
// ---------------------------------------------------------------------------

/// One scripted answer to `fetch_status`.
#[derive(Debug, Clone)]
pub enum Step {
    Status(JobStatus),
    Succeeded,
    SucceededEmpty,
    Failed(&'static str),
    Transient,
}

/// Prediction service replaying a script per job.
///
/// Jobs are named `job-{n}`. A job whose source URL has no registered
/// script runs once and then succeeds. A succeeded job's output is
/// `https://replicate.delivery/{job id}.png`.
#[derive(Default)]
pub struct FakePredictionService {
    pub reject_submit: bool,
    /// Leave `cancel_url` off the submitted job and only report it in
    /// status snapshots.
    pub late_cancel_url: bool,
    pub(crate) scripts: Mutex<HashMap<String, Vec<Step>>>,
    pub(crate) jobs: Mutex<HashMap<String, VecDeque<Step>>>,
    pub(crate) submitted: Mutex<Vec<String>>,
    pub(crate) cancelled: Mutex<Vec<String>>,
    pub(crate) active: AtomicUsize,
    pub(crate) max_active: AtomicUsize,
}

impl FakePredictionService {
    /// Register the fetch script used for jobs on `source_url`.
    pub fn script(&self, source_url: &str, steps: Vec<Step>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(source_url.to_string(), steps);
    }

    /// Source URLs submitted, in order.
    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    /// Job ids cancelled upstream.
    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    /// Highest number of simultaneously unfinished jobs observed.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn finish(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PredictionService for FakePredictionService {
    async fn submit(&self, request: &GenerationRequest) -> Result<Job, PredictionError> {
        if self.reject_submit {
            return Err(PredictionError::ApiError {
                status: 422,
                body: "invalid version".into(),
            });
        }
        let source = request.source_image_url().to_string();
        let id = {
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(source.clone());
            format!("job-{}", submitted.len())
        };
        let steps = self
            .scripts
            .lock()
            .unwrap()
            .get(&source)
            .cloned()
            .unwrap_or_else(|| vec![Step::Status(JobStatus::Running), Step::Succeeded]);
        self.jobs.lock().unwrap().insert(id.clone(), steps.into());

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let mut job = Job::new(
            id.clone(),
            format!("https://api.test/v1/predictions/{id}"),
            JobStatus::Queued,
        );
        if !self.late_cancel_url {
            job.cancel_url = Some(cancel_url(&id));
        }
        Ok(job)
    }

    async fn fetch_status(&self, job: &Job) -> Result<Job, PredictionError> {
        let step = self
            .jobs
            .lock()
            .unwrap()
            .get_mut(&job.id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Step::Status(JobStatus::Running));

        let mut snapshot = Job::new(job.id.clone(), job.status_url.clone(), JobStatus::Running);
        snapshot.cancel_url = Some(cancel_url(&job.id));
        match step {
            Step::Status(status) => snapshot.status = status,
            Step::Succeeded => {
                snapshot.status = JobStatus::Succeeded;
                snapshot.output = vec![format!("https://replicate.delivery/{}.png", job.id)];
            }
            Step::SucceededEmpty => snapshot.status = JobStatus::Succeeded,
            Step::Failed(reason) => {
                snapshot.status = JobStatus::Failed;
                snapshot.error = Some(reason.to_string());
            }
            Step::Transient => {
                return Err(PredictionError::ApiError {
                    status: 503,
                    body: "upstream unavailable".into(),
                })
            }
        }
        if snapshot.status.is_terminal() {
            self.finish();
        }
        Ok(snapshot)
    }

    async fn cancel(&self, job: &Job) -> Result<(), PredictionError> {
        if job.cancel_url.is_none() {
            return Err(PredictionError::InvalidRequest(format!("job {} has no cancel URL", job.id)));
        }
        self.cancelled.lock().unwrap().push(job.id.clone());
        self.finish();
        Ok(())
    }
}

fn cancel_url(id: &str) -> String {
    format!("https://api.test/v1/predictions/{id}/cancel")
}

pub fn media() -> Arc<FakeMediaStore> {
    Arc::new(FakeMediaStore::default())
}

pub fn predictions() -> Arc<FakePredictionService> {
    Arc::new(FakePredictionService::default())
}
