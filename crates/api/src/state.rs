use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use selfie_media::store::MediaStore;
use selfie_pipeline::orchestrator::Orchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Generation pipeline shared by every request.
    pub orchestrator: Arc<Orchestrator>,
    /// Media store used directly by the delete endpoint.
    pub media: Arc<dyn MediaStore>,
    /// Cancelled when the server shuts down. Every generation runs under a
    /// child of this token.
    pub shutdown: CancellationToken,
}
