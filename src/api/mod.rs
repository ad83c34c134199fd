//! HTTP API for progress inspection and event submission

use crate::config::ApiConfig;
use crate::engine::ProgressHandle;
use crate::error::{ProgressError, ProgressResult};
use crate::events::ProgressEvent;
use crate::steps::StepDescriptor;
use crate::tracker::ProgressSnapshot;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub progress: ProgressHandle,
}

/// Build the API router
pub fn router(progress: ProgressHandle) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/progress", get(get_progress))
        .route("/events", post(post_event))
        .route("/seed", post(post_seed))
        .route("/reset", post(post_reset))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { progress })
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, progress: ProgressHandle) -> ProgressResult<()> {
    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ProgressError::Internal(format!("bind {}: {}", addr, e)))?;
    axum::serve(listener, router(progress))
        .await
        .map_err(|e| ProgressError::Internal(e.to_string()))?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn get_progress(State(state): State<AppState>) -> Json<ProgressSnapshot> {
    Json(state.progress.snapshot())
}

async fn post_event(State(state): State<AppState>, Json(event): Json<ProgressEvent>) -> Response {
    respond(state.progress.apply(event).await)
}

async fn post_seed(
    State(state): State<AppState>,
    Json(expected): Json<Vec<StepDescriptor>>,
) -> Response {
    respond(state.progress.seed(expected).await)
}

async fn post_reset(State(state): State<AppState>) -> Response {
    respond(state.progress.reset().await)
}

fn respond(result: ProgressResult<ProgressSnapshot>) -> Response {
    match result {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => {
            let status = match &e {
                ProgressError::KeyDerivation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                ProgressError::EventParsing(_) => StatusCode::BAD_REQUEST,
                ProgressError::EngineClosed => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(ErrorResponse {
                    error: e.to_string(),
                    kind: e.kind(),
                }),
            )
                .into_response()
        }
    }
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}
