//! Health handlers
//!
//! `GET /health` always answers 200; downstream failures are reported in the
//! body, never as an HTTP error.

use axum::extract::{Path, State};
use axum::Json;
use boxoffice_core::{HealthReport, PingOutcome};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.health().check().await)
}

/// GET /health/{service}
pub async fn service_health(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Result<Json<PingOutcome>, ApiError> {
    state
        .health()
        .check_service(&service)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Service not found: {}", service)))
}
