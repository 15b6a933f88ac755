pub mod health;
pub mod selfie;

use axum::Router;

use crate::state::AppState;

/// Build the public route tree.
///
/// ```text
/// /health                    service health
/// /generate-selfie           generate from an uploaded image URL (POST)
/// /generate-selfie/upload    upload, generate and clean up (POST, multipart)
/// /delete-user-image         delete a media store asset (POST)
/// ```
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(selfie::router())
}
