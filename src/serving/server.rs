//! HTTP surface over `ServingFront` with KServe v2 style routes.
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::serving::envelope::InferResponse;
use crate::serving::front::ServingFront;
use crate::types::PipelineState;

/// Readiness response for one model.
#[derive(Debug, Serialize)]
pub struct ModelReadyResponse {
    pub name: String,
    pub ready: bool,
    pub state: PipelineState,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub live: bool,
    pub ready: bool,
    pub version: String,
}

/// POST /v2/models/:name/infer
///
/// The body is handed to the front untouched so that unparseable bodies still
/// produce an error envelope. Error envelopes are returned with status 200.
async fn infer_handler(
    Extension(front): Extension<Arc<ServingFront>>,
    Path(name): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    let endpoint = name.clone();
    let response = tokio::task::spawn_blocking(move || front.handle(&name, &body)).await;
    match response {
        Ok(envelope) => Json(envelope),
        Err(e) => {
            error!(endpoint = %endpoint, error = %e, "Inference task aborted");
            Json(InferResponse::error(&endpoint, "inference task aborted"))
        }
    }
}

/// GET /v2/models/:name/ready
async fn model_ready_handler(
    Extension(front): Extension<Arc<ServingFront>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match front.state(&name) {
        Some(state) => {
            let ready = state == PipelineState::Ready;
            let status = if ready {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            (status, Json(ModelReadyResponse { name, ready, state })).into_response()
        }
        None => (StatusCode::NOT_FOUND, format!("unknown model: {}", name)).into_response(),
    }
}

/// GET /v2/health/live
async fn live_handler(Extension(front): Extension<Arc<ServingFront>>) -> impl IntoResponse {
    Json(HealthResponse {
        live: true,
        ready: front.is_ready(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /v2/health/ready
async fn ready_handler(Extension(front): Extension<Arc<ServingFront>>) -> impl IntoResponse {
    let ready = front.is_ready();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            live: true,
            ready,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Build the HTTP router.
pub fn build_router(front: Arc<ServingFront>) -> Router {
    Router::new()
        .route("/v2/models/:name/infer", post(infer_handler))
        .route("/v2/models/:name/ready", get(model_ready_handler))
        .route("/v2/health/live", get(live_handler))
        .route("/v2/health/ready", get(ready_handler))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(front))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutting down");
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(front: Arc<ServingFront>, addr: SocketAddr) -> std::io::Result<()> {
    let app = build_router(front.clone());
    info!(%addr, endpoints = ?front.endpoint_names(), "Starting skyfuse HTTP server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}
