//! The capability every downstream transport provides
//!
//! The gateway only ever talks to downstream services through
//! `Arc<dyn ServiceClient>` handles, so the same aggregation and relay logic
//! runs over a socket, an in-process router, or a test double.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::error::RpcErrorPayload;
use crate::models::ServiceIdentity;

/// Result type for client calls
pub type ClientResult<T> = Result<T, ClientError>;

/// Failures observed by the caller of a message pattern.
///
/// `Rpc` is the only normalized kind: the downstream answered with an error
/// value. Every other variant is a transport-level fault.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The downstream answered with an error value
    #[error("{}", RpcErrorPayload::from_wire(.0).message)]
    Rpc(Value),

    /// Connecting, writing, or reading failed
    #[error("{0}")]
    Transport(String),

    /// The connection closed before a response arrived
    #[error("Connection closed")]
    ConnectionClosed,

    /// No response within the caller's bound
    #[error("Timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// A response arrived but could not be understood
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ClientError {
    /// Normalized payload when the downstream raised an RPC error
    pub fn rpc_payload(&self) -> Option<RpcErrorPayload> {
        match self {
            ClientError::Rpc(value) => Some(RpcErrorPayload::from_wire(value)),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout(_))
    }
}

/// Request/response handle to one downstream service
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// Identity this handle was configured with
    fn identity(&self) -> &ServiceIdentity;

    /// Send `data` under `pattern` and wait for the response value
    async fn send(&self, pattern: &str, data: Value) -> ClientResult<Value>;

    fn name(&self) -> &str {
        &self.identity().name
    }
}
