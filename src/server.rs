//! HTTP host for the boundary adapter.
//!
//! | Route | Handler |
//! |---|---|
//! | `POST /api/convert` | multipart upload → [`ConvertResponse`] JSON |
//! | `GET /health` | `{"status":"ok"}` |
//!
//! Encoding is CPU-bound, so the whole batch runs on tokio's blocking pool
//! and fans out onto one rayon pool shared by every request. The async side
//! only parses the body and serializes the answer.

use crate::boundary::{self, BoundaryError, ConvertResponse};
use crate::codec::Quality;
use crate::config::ServiceConfig;
use crate::convert::{ConvertOptions, build_pool, convert_in};
use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use rayon::{ThreadPool, ThreadPoolBuildError};
use serde_json::{Value, json};
use std::future::Future;
use std::io;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Per-process settings and the encoder pool. Holds no request data.
pub struct AppState {
    pub options: ConvertOptions,
    pub default_quality: Quality,
    pub archive_name: String,
    /// Sized by `options.workers`; bounds encodes across all requests.
    pub pool: ThreadPool,
}

impl AppState {
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ThreadPoolBuildError> {
        let options = ConvertOptions::from_config(&config.conversion);
        let pool = build_pool(options.workers)?;
        Ok(Self {
            options,
            default_quality: config.conversion.default_quality(),
            archive_name: config.archive.file_name.clone(),
            pool,
        })
    }
}

/// Build the application router.
pub fn router(config: &ServiceConfig) -> Result<Router, ThreadPoolBuildError> {
    let state = Arc::new(AppState::from_config(config)?);
    Ok(Router::new()
        .route("/api/convert", post(convert_images))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(config.server.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[tracing::instrument(skip_all)]
async fn convert_images(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match handle_convert(state, &headers, body).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => {
            let (status, body) = err.to_response();
            if status.is_server_error() {
                error!(error = %err, "conversion request failed");
            } else {
                info!(error = %err, "conversion request rejected");
            }
            (status, Json(body)).into_response()
        }
    }
}

async fn handle_convert(
    state: Arc<AppState>,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<ConvertResponse, BoundaryError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let request = boundary::parse_multipart(content_type, body, state.default_quality).await?;
    let quality = request.quality;

    let worker_state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        convert_in(&worker_state.pool, &request, &worker_state.options)
    })
    .await
    .map_err(|e| BoundaryError::Task(e.to_string()))??;

    Ok(boundary::build_response(
        &result,
        quality,
        &state.archive_name,
    ))
}

/// Resolves once `signal` fires. A signal that could not be installed never
/// resolves, so the server keeps running instead of exiting at startup.
pub async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
