//! HTTP server for template alignment.

use crate::api::{AlignRequest, AlignResponse, run_alignment};
use crate::config::ServerConfig;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use oar_kvmap::kvmap::TemplateAligner;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers
struct AppState {
    aligner: TemplateAligner,
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Build the router with all endpoints
fn router(aligner: TemplateAligner) -> Router {
    let state = Arc::new(AppState { aligner });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/align", post(align_handler))
        .route("/api/v1/align", post(align_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let aligner = TemplateAligner::new(config.align.clone())?;
    let app = router(aligner);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    info!("Server listening on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /health       - Health check");
    info!("  POST /align        - Template alignment");
    info!("  POST /api/v1/align - Template alignment (versioned API)");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Health check endpoint
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Alignment endpoint
async fn align_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AlignRequest>,
) -> impl IntoResponse {
    let request_id = uuid::Uuid::new_v4().to_string();
    info!(
        request_id = %request_id,
        template = %request.template.image,
        annotations = request.template.annotations.len(),
        "Processing alignment request"
    );

    let start = Instant::now();
    let result = match run_alignment(&state.aligner, &request) {
        Ok(result) => result,
        Err(e) => {
            error!(request_id = %request_id, error = %e.report(), "Alignment rejected");
            return (
                StatusCode::BAD_REQUEST,
                Json(AlignResponse::error(format!("Alignment rejected: {}", e))),
            );
        }
    };
    let processing_ms = start.elapsed().as_secs_f64() * 1000.0;

    info!(
        request_id = %request_id,
        keys_matched = result.stats.keys_matched(),
        keys_unmatched = result.stats.keys_unmatched,
        value_lines = result.stats.value_lines,
        processing_ms,
        "Alignment completed"
    );

    (StatusCode::OK, Json(AlignResponse::ok(result, processing_ms)))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
