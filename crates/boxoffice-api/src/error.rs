//! API error types and conversions
//!
//! Every failure leaving the gateway goes through [`ApiError`]. Downstream RPC
//! errors are mapped by code onto a bounded set of HTTP statuses; transport
//! faults become 503/504 with generic messages so no internal detail leaks.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use boxoffice_core::{ClientError, RpcError, RpcErrorCode, RpcErrorPayload};
use boxoffice_gateway::GatewayError;
use serde::Serialize;
use serde_json::Value;

/// API error type that converts to HTTP responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 400 Bad Request
    BadRequest(String),
    /// 401 Unauthorized
    Unauthorized(String),
    /// 403 Forbidden
    Forbidden(String),
    /// 404 Not Found
    NotFound(String),
    /// 503 Service Unavailable (downstream unreachable)
    ServiceUnavailable(String),
    /// 504 Gateway Timeout
    GatewayTimeout(String),
    /// 500 Internal Server Error
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::GatewayTimeout(_) => "gateway_timeout",
            ApiError::Internal(_) => "internal_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::ServiceUnavailable(msg)
            | ApiError::GatewayTimeout(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

/// Standard error response format
#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
    message: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_type = self.kind();
        let message = self.message();

        // Log errors at appropriate levels
        if status.is_server_error() {
            tracing::error!(error = error_type, %message, "API error");
        } else if status.is_client_error() {
            tracing::debug!(error = error_type, %message, "API client error");
        }

        let body = Json(ErrorResponse {
            error: error_type,
            message,
        });

        (status, body).into_response()
    }
}

/// Map an error value received from a downstream service to its outward form.
///
/// Total over all inputs: the payload is looked up under an `error` field
/// or taken as the whole value, and unknown or missing codes fall through to
/// an internal error.
pub fn map_rpc_error(err: &Value) -> ApiError {
    ApiError::from(RpcErrorPayload::from_wire(err))
}

/// Re-tag a failure raised by the gateway's own request parsing so it goes
/// through the same mapping as downstream errors.
///
/// A 4xx status from the parsing layer means the caller sent something
/// invalid; anything else is an internal fault.
pub fn normalize_request_failure(status: StatusCode, details: Value) -> RpcErrorPayload {
    let error = if status.is_client_error() {
        RpcError::validation_error("Validation Error")
    } else {
        RpcError::internal_server_error("Internal Server Error")
    };
    error.with_details(details).into_payload()
}

impl From<RpcErrorPayload> for ApiError {
    fn from(payload: RpcErrorPayload) -> Self {
        if let Some(details) = &payload.details {
            tracing::debug!(code = %payload.code, %details, "RPC error details");
        }

        let message = payload.message;
        match payload.code {
            RpcErrorCode::BadRequest | RpcErrorCode::ValidationError => {
                ApiError::BadRequest(message)
            }
            RpcErrorCode::NotFound => ApiError::NotFound(message),
            RpcErrorCode::Unauthorized => ApiError::Unauthorized(message),
            RpcErrorCode::Forbidden => ApiError::Forbidden(message),
            RpcErrorCode::InternalServerError | RpcErrorCode::UnknownError => {
                ApiError::Internal(message)
            }
        }
    }
}

impl From<RpcError> for ApiError {
    fn from(err: RpcError) -> Self {
        ApiError::from(err.into_payload())
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Rpc(value) => map_rpc_error(&value),
            ClientError::Timeout(_) => {
                ApiError::GatewayTimeout("Downstream service did not respond in time".to_string())
            }
            ClientError::Transport(_)
            | ClientError::ConnectionClosed
            | ClientError::Malformed(_) => {
                ApiError::ServiceUnavailable("Downstream service unavailable".to_string())
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::UnknownService(name) => {
                ApiError::NotFound(format!("Service not found: {}", name))
            }
            GatewayError::Client { service, source } => {
                if source.rpc_payload().is_none() {
                    tracing::warn!(%service, error = %source, "Downstream call failed");
                }
                ApiError::from(source)
            }
        }
    }
}
