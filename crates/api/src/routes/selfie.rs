use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;

use crate::handlers::selfie;
use crate::state::AppState;

/// Largest accepted photo upload.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Selfie generation and image cleanup routes.
///
/// ```text
/// POST /generate-selfie           generate_selfie
/// POST /generate-selfie/upload    generate_selfie_upload
/// POST /delete-user-image         delete_user_image
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate-selfie", post(selfie::generate_selfie))
        .route(
            "/generate-selfie/upload",
            post(selfie::generate_selfie_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/delete-user-image", post(selfie::delete_user_image))
}
