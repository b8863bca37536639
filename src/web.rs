//! Axum-based HTTP surface standing in for the host platform
//!
//! Exposes entity states rendered from the latest snapshot, the raw snapshot,
//! the "update now" trigger, manual reading submission and the options form.

use crate::api::{Endpoints, HttpTransport, WateriusApi};
use crate::config::{Config, OptionsUpdate};
use crate::coordinator::CoordinatorHandle;
use crate::error::{Result, WateriusError};
use crate::presentation::EntityRegistry;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: CoordinatorHandle,
    pub entities: Arc<EntityRegistry>,
    /// Active configuration; options edits apply to it at runtime only
    pub config: Arc<Mutex<Config>>,
}

#[derive(Debug, Deserialize)]
pub struct ReadingBody {
    pub value: Value,
}

fn error_response(status: StatusCode, err: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let refresh = state.coordinator.state();
    Json(json!({
        "last_update_success": refresh.last_update_success,
        "last_error": refresh.last_error,
        "last_attempt": refresh.last_attempt.map(|t| t.to_rfc3339()),
        "refreshed_at": refresh.snapshot.as_ref().map(|s| s.refreshed_at.to_rfc3339()),
    }))
}

pub async fn snapshot(State(state): State<AppState>) -> Response {
    match state.coordinator.snapshot() {
        Some(snapshot) => Json(snapshot.as_ref().clone()).into_response(),
        None => error_response(StatusCode::SERVICE_UNAVAILABLE, "No data yet"),
    }
}

pub async fn entities(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.entities.states())
}

pub async fn entity(State(state): State<AppState>, Path(unique_id): Path<String>) -> Response {
    match state.entities.find(&unique_id) {
        Some(entity) => Json(entity.state()).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("Unknown entity {}", unique_id)),
    }
}

pub async fn refresh(State(state): State<AppState>) -> Response {
    match state.entities.update_button.press() {
        Ok(()) => (StatusCode::ACCEPTED, Json(json!({ "ok": true }))).into_response(),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e),
    }
}

pub async fn send_reading(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Json(body): Json<ReadingBody>,
) -> Response {
    match state.coordinator.send_reading(channel_id, body.value).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, e),
    }
}

pub async fn send_all(State(state): State<AppState>) -> Response {
    match state.coordinator.send_all().await {
        Ok(sent) => (StatusCode::OK, Json(json!({ "ok": true, "sent": sent }))).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, e),
    }
}

/// Options form: validate, rebuild the API client and hand it to the loop
pub async fn update_options(
    State(state): State<AppState>,
    Json(options): Json<OptionsUpdate>,
) -> Response {
    let mut config = state.config.lock().await;
    let mut updated = config.clone();
    if let Err(e) = updated.apply_options(&options) {
        return error_response(StatusCode::BAD_REQUEST, e);
    }
    let transport = match HttpTransport::new(&updated.token) {
        Ok(t) => t,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    };
    let api = WateriusApi::new(
        Arc::new(transport),
        Endpoints::new(&updated.api.base_url),
        updated.request_timeout(),
    );
    if let Err(e) = state
        .coordinator
        .reconfigure(api, updated.update_interval())
        .await
    {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, e);
    }
    *config = updated;
    Json(json!({
        "ok": true,
        "scan_interval_minutes": config.scan_interval_minutes,
    }))
    .into_response()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/snapshot", get(snapshot))
        .route("/api/entities", get(entities))
        .route("/api/entities/{unique_id}", get(entity))
        .route("/api/refresh", post(refresh))
        .route("/api/channels/{channel_id}/reading", post(send_reading))
        .route("/api/readings/send_all", post(send_all))
        .route("/api/options", post(update_options))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| WateriusError::web(format!("Invalid listen address {}:{}: {}", host, port, e)))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| WateriusError::web(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!("Web server listening on {}", addr);
    axum::serve(listener, router(state))
        .await
        .map_err(|e| WateriusError::web(format!("Server error: {}", e)))
}
