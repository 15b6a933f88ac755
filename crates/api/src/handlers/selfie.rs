//! Handlers for selfie generation and user image deletion.
//!
//! Generations run in a spawned task under a child of the shutdown token.
//! The handler holds a drop guard on that token, so a client that
//! disconnects mid-generation cancels the task, and the task still deletes
//! its source upload before exiting.

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use selfie_core::error::CoreError;
use selfie_core::generation::validate_storage_id;
use selfie_media::store::DeleteOutcome;
use selfie_pipeline::error::GenerationError;
use selfie_pipeline::orchestrator::{GenerationOutput, Orchestrator, SourceImage};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Multipart field carrying the photo.
const FILE_FIELD: &str = "file";

/// File name used when the client does not send one.
const DEFAULT_FILE_NAME: &str = "selfie.jpg";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSelfieRequest {
    #[serde(default)]
    pub user_image_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSelfieResponse {
    pub generated_image_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSelfieResponse {
    pub generated_image_url: String,
    /// Whether the URL points at the media store rather than the
    /// prediction service's expiring output.
    pub rehosted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImageRequest {
    #[serde(default)]
    pub public_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /generate-selfie
///
/// Generate a selfie from an image the client already uploaded. The source
/// image belongs to the client and is left untouched.
pub async fn generate_selfie(
    State(state): State<AppState>,
    Json(body): Json<GenerateSelfieRequest>,
) -> AppResult<Json<GenerateSelfieResponse>> {
    let url = body
        .user_image_url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("userImageUrl required".to_string()))?;

    let output = run_generation(&state, move |orchestrator, cancel| async move {
        orchestrator.generate_from_url(&url, &cancel).await
    })
    .await?;

    Ok(Json(GenerateSelfieResponse {
        generated_image_url: output.url,
    }))
}

/// POST /generate-selfie/upload
///
/// Accept the photo as multipart field `file`, then upload, generate and
/// delete the upload again.
pub async fn generate_selfie_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadSelfieResponse>> {
    let mut source = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME)
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        source = Some(SourceImage {
            data: data.to_vec(),
            file_name,
        });
    }

    let source = source
        .filter(|s| !s.data.is_empty())
        .ok_or_else(|| AppError::BadRequest("file required".to_string()))?;
    tracing::info!(file_name = %source.file_name, bytes = source.data.len(), "Received selfie upload");

    let output = run_generation(&state, move |orchestrator, cancel| async move {
        orchestrator.generate(source, &cancel).await
    })
    .await?;

    Ok(Json(UploadSelfieResponse {
        generated_image_url: output.url,
        rehosted: output.rehosted,
    }))
}

/// POST /delete-user-image
pub async fn delete_user_image(
    State(state): State<AppState>,
    Json(body): Json<DeleteImageRequest>,
) -> AppResult<Json<MessageResponse>> {
    let public_id = body.public_id.unwrap_or_default();
    validate_storage_id(&public_id)?;

    match state.media.delete(&public_id).await? {
        DeleteOutcome::Deleted => {
            tracing::info!(storage_id = %public_id, "User image deleted");
            Ok(Json(MessageResponse {
                message: "Image deleted successfully",
            }))
        }
        DeleteOutcome::NotFound => Err(AppError::Core(CoreError::NotFound {
            entity: "Image",
            id: public_id,
        })),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run one generation in its own task, cancelled if this future is dropped
/// or the server shuts down.
async fn run_generation<F, Fut>(state: &AppState, work: F) -> AppResult<GenerationOutput>
where
    F: FnOnce(Arc<Orchestrator>, CancellationToken) -> Fut,
    Fut: Future<Output = Result<GenerationOutput, GenerationError>> + Send + 'static,
{
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    let task = tokio::spawn(work(Arc::clone(&state.orchestrator), cancel));
    match task.await {
        Ok(result) => {
            let output = result?;
            tracing::info!(job_id = %output.job_id, rehosted = output.rehosted, "Selfie generated");
            Ok(output)
        }
        Err(e) => Err(AppError::InternalError(format!("Generation task failed: {e}"))),
    }
}
