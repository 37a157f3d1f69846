//! RPC error taxonomy shared by every downstream service
//!
//! Downstream handlers report failure exclusively through [`RpcError`]. The
//! error travels across the transport as an [`RpcErrorPayload`] and is turned
//! back into an outward status by the gateway.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Message used when an error value carries no message of its own
pub const DEFAULT_FAILURE_MESSAGE: &str = "Request Failed.";

/// Closed set of error codes understood on both sides of the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcErrorCode {
    /// Invalid input, malformed request (400)
    BadRequest,
    /// Request payload failed validation (400)
    ValidationError,
    /// Resource does not exist (404)
    NotFound,
    /// Missing or invalid authentication (401)
    Unauthorized,
    /// Authenticated but not permitted (403)
    Forbidden,
    /// Unexpected failure inside the service (500)
    InternalServerError,
    /// Catch-all for errors whose code is missing or unrecognised
    UnknownError,
}

impl RpcErrorCode {
    pub const ALL: [RpcErrorCode; 7] = [
        RpcErrorCode::BadRequest,
        RpcErrorCode::ValidationError,
        RpcErrorCode::NotFound,
        RpcErrorCode::Unauthorized,
        RpcErrorCode::Forbidden,
        RpcErrorCode::InternalServerError,
        RpcErrorCode::UnknownError,
    ];

    /// Wire representation of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcErrorCode::BadRequest => "BAD_REQUEST",
            RpcErrorCode::ValidationError => "VALIDATION_ERROR",
            RpcErrorCode::NotFound => "NOT_FOUND",
            RpcErrorCode::Unauthorized => "UNAUTHORIZED",
            RpcErrorCode::Forbidden => "FORBIDDEN",
            RpcErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
            RpcErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Parse a wire code. Returns `None` for anything outside the closed set.
    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == code)
    }

    /// Message used when a code is raised without a caller-supplied message
    pub fn default_message(&self) -> &'static str {
        match self {
            RpcErrorCode::BadRequest => "Bad Request",
            RpcErrorCode::ValidationError => "Validation Error",
            RpcErrorCode::NotFound => "Not Found",
            RpcErrorCode::Unauthorized => "Unauthorized",
            RpcErrorCode::Forbidden => "Forbidden",
            RpcErrorCode::InternalServerError => "Internal Server Error",
            RpcErrorCode::UnknownError => DEFAULT_FAILURE_MESSAGE,
        }
    }
}

impl fmt::Display for RpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error value as it crosses the service boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorPayload {
    pub code: RpcErrorCode,
    pub message: String,
    /// Opaque passthrough, safe to omit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl RpcErrorPayload {
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Recover a payload from whatever arrived as the error value.
    ///
    /// An embedded `error` field is inspected first, otherwise the whole value
    /// is treated as the payload. A missing or unrecognised `code` becomes
    /// [`RpcErrorCode::UnknownError`] and a missing `message` becomes
    /// [`DEFAULT_FAILURE_MESSAGE`], so every input yields a payload.
    ///
    /// ```
    /// # use boxoffice_core::{RpcErrorCode, RpcErrorPayload};
    /// let err = serde_json::json!({"error": {"code": "NOT_FOUND", "message": "X"}});
    /// let payload = RpcErrorPayload::from_wire(&err);
    /// assert_eq!(payload.code, RpcErrorCode::NotFound);
    /// assert_eq!(payload.message, "X");
    /// ```
    pub fn from_wire(err: &Value) -> Self {
        let payload = err.get("error").unwrap_or(err);

        let code = payload
            .get("code")
            .and_then(Value::as_str)
            .and_then(RpcErrorCode::parse)
            .unwrap_or(RpcErrorCode::UnknownError);
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_FAILURE_MESSAGE)
            .to_string();
        let details = payload.get("details").filter(|d| !d.is_null()).cloned();

        Self {
            code,
            message,
            details,
        }
    }

    pub fn to_wire(&self) -> Value {
        // Serializing a struct of strings and a Value cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A tagged failure raised by downstream service logic.
///
/// The constructors below are the only sanctioned way for a handler to report
/// failure with a meaningful outward status. Any other error type reaching the
/// service boundary is reported as `INTERNAL_SERVER_ERROR`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{} ({})", .0.message, .0.code)]
pub struct RpcError(RpcErrorPayload);

impl RpcError {
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self(RpcErrorPayload::new(code, message))
    }

    /// Raise a code with its default message
    pub fn from_code(code: RpcErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::BadRequest, message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::ValidationError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::NotFound, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Forbidden, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InternalServerError, message)
    }

    /// Attach opaque context (input values, field names, ...)
    pub fn with_details(mut self, details: Value) -> Self {
        self.0.details = Some(details);
        self
    }

    pub fn code(&self) -> RpcErrorCode {
        self.0.code
    }

    pub fn message(&self) -> &str {
        &self.0.message
    }

    pub fn payload(&self) -> &RpcErrorPayload {
        &self.0
    }

    pub fn into_payload(self) -> RpcErrorPayload {
        self.0
    }
}

impl From<RpcErrorPayload> for RpcError {
    fn from(payload: RpcErrorPayload) -> Self {
        Self(payload)
    }
}
