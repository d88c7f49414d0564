//! HTTP surface
//!
//! Four endpoints: event submission, the maintenance toggle, a health
//! check, and Prometheus metrics. Handlers translate admission outcomes
//! to status codes and hold no pipeline logic of their own.

use crate::admission::{AdmissionError, Collector};
use crate::error::Result;
use crate::flush::Flusher;
use crate::maintenance::MaintenanceError;
use crate::metrics;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Header carrying the hex HMAC-SHA256 of the request body
pub const SIGNATURE_HEADER: &str = "x-tolva-signature";
/// Header carrying the submitting client's identifier
pub const CLIENT_HEADER: &str = "x-tolva-client";

/// Shared handler state
#[derive(Clone)]
pub struct ServerState {
    /// Admission pipeline
    pub collector: Arc<Collector>,
    /// Flusher, for health reporting
    pub flusher: Arc<Flusher>,
}

/// Build the collector's router
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/api/v1/track", post(track))
        .route("/api/v1/maintenance", post(maintenance))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
}

/// Bind and serve until the shutdown signal resolves
pub async fn serve(
    address: &str,
    state: ServerState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    tracing::info!(address, "collector listening");
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(())
}

/// Client address: proxy header first, then the socket peer
fn remote_addr(headers: &HeaderMap, peer: SocketAddr) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .or(Some(peer.ip()))
}

async fn track(
    State(state): State<ServerState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let client_id = headers
        .get(CLIENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    let addr = remote_addr(&headers, peer);

    match state.collector.submit(body, signature, client_id, addr).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(AdmissionError::InvalidSignature) => {
            (StatusCode::UNAUTHORIZED, "invalid signature").into_response()
        }
        Err(AdmissionError::Maintenance) => {
            (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response()
        }
        Err(AdmissionError::QueueFull) => {
            (StatusCode::TOO_MANY_REQUESTS, "queue full").into_response()
        }
        Err(AdmissionError::Closed) => {
            (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response()
        }
    }
}

/// Maintenance toggle request body
#[derive(Debug, Deserialize)]
pub struct MaintenanceRequest {
    /// Desired pause state
    pub paused: bool,
    /// Operator key matching the configured `maintenance_key`
    pub key: String,
}

async fn maintenance(
    State(state): State<ServerState>,
    Json(req): Json<MaintenanceRequest>,
) -> Response {
    match state.collector.gate().set(req.paused, &req.key) {
        Ok(()) => {
            tracing::info!(paused = req.paused, "maintenance state changed");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(MaintenanceError::InvalidKey) => {
            (StatusCode::FORBIDDEN, "invalid maintenance key").into_response()
        }
        Err(MaintenanceError::Disabled) => {
            (StatusCode::NOT_FOUND, "maintenance toggle disabled").into_response()
        }
    }
}

async fn healthz(State(state): State<ServerState>) -> Response {
    let dialect_healthy = state.flusher.health().await;
    let body = serde_json::json!({
        "status": if dialect_healthy { "ok" } else { "degraded" },
        "dialect": state.flusher.dialect_name(),
        "dialect_healthy": dialect_healthy,
        "queue_depth": state.collector.queue().len(),
        "paused": state.collector.gate().is_paused(),
    });
    let status = if dialect_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

async fn metrics_endpoint() -> Response {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        metrics::gather(),
    )
        .into_response()
}
