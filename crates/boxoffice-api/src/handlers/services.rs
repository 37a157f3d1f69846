//! Service listing and message relay handlers

use axum::extract::{Path, State};
use axum::Json;
use boxoffice_core::ServiceIdentity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::error::ApiError;
use crate::extract::ValidatedJson;
use crate::state::AppState;

/// Registered downstream services
#[derive(Debug, Serialize)]
pub struct ServiceList {
    pub items: Vec<ServiceIdentity>,
}

/// Message to relay to a downstream service
#[derive(Debug, Deserialize, Validate)]
pub struct RelayRequest {
    /// Message pattern the downstream routes on, e.g. `catalog.find`
    #[validate(length(min = 1, message = "pattern must not be empty"))]
    pub pattern: String,
    #[serde(default)]
    pub data: Value,
}

/// GET /services
pub async fn list_services(State(state): State<AppState>) -> Json<ServiceList> {
    Json(ServiceList {
        items: state.registry().identities(),
    })
}

/// POST /services/{service}/messages
pub async fn relay_message(
    State(state): State<AppState>,
    Path(service): Path<String>,
    ValidatedJson(request): ValidatedJson<RelayRequest>,
) -> Result<Json<Value>, ApiError> {
    tracing::debug!(%service, pattern = %request.pattern, "Relay request");

    let response = state
        .registry()
        .call(&service, &request.pattern, request.data)
        .await?;

    Ok(Json(response))
}
