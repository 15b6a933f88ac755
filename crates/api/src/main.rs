use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use selfie_api::config::ServerConfig;
use selfie_api::router::build_app_router;
use selfie_api::state::AppState;
use selfie_media::cloudinary::CloudinaryStore;
use selfie_media::store::MediaStore;
use selfie_pipeline::orchestrator::Orchestrator;
use selfie_prediction::api::ReplicateApi;
use selfie_prediction::service::PredictionService;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "selfie_api=debug,selfie_pipeline=debug,selfie_prediction=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });
    tracing::info!(
        host = %config.host,
        port = %config.port,
        folder = %config.pipeline.folder,
        max_concurrent_jobs = config.pipeline.max_concurrent_jobs,
        "Loaded server configuration",
    );

    // --- Upstream clients ---
    let media: Arc<dyn MediaStore> = Arc::new(CloudinaryStore::new(config.cloudinary.clone()));
    let predictions: Arc<dyn PredictionService> = Arc::new(
        ReplicateApi::new(config.replicate.clone()).expect("Failed to build prediction client"),
    );

    // --- Pipeline ---
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&media),
        predictions,
        config.poll.clone(),
        config.pipeline.clone(),
    ));

    // --- App state ---
    let shutdown = CancellationToken::new();
    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator: Arc::clone(&orchestrator),
        media,
        shutdown: shutdown.clone(),
    };

    let app = build_app_router(state, &config).expect("Invalid CORS configuration");

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    let drain_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let signal_token = shutdown.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        // Cancel running generations so they abandon their jobs and clean up.
        signal_token.cancel();
    });

    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server => {
            report_server_exit(result);
            return;
        }
        _ = shutdown.cancelled() => {}
    }

    // --- Drain ---
    match tokio::time::timeout(drain_timeout, server).await {
        Ok(result) => report_server_exit(result),
        Err(_) => tracing::warn!(
            in_flight = orchestrator.in_flight(),
            "Requests still running after drain timeout, exiting",
        ),
    }

    tracing::info!("Graceful shutdown complete");
}

fn report_server_exit(result: Result<std::io::Result<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Server error"),
        Err(e) => tracing::error!(error = %e, "Server task failed"),
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
