//! Pattern → handler dispatch table for a downstream service
//!
//! Handlers are registered under a message pattern at startup. Dispatch looks
//! the pattern up, decodes the request into the handler's typed input, runs
//! it, and normalizes whatever comes out into either a response value or an
//! [`RpcErrorPayload`].

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use boxoffice_core::{RpcError, RpcErrorCode, RpcErrorPayload};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Type-erased handler so routes with different request/response types can
/// share one table
trait Handler: Send + Sync {
    fn call(&self, data: Value) -> BoxFuture<Result<Value, RpcErrorPayload>>;
}

/// Adapter from a typed `Fn(Req) -> Future<Output = anyhow::Result<Resp>>`
struct TypedHandler<Req, Resp, H> {
    handler: H,
    _phantom: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp, H, Fut> Handler for TypedHandler<Req, Resp, H>
where
    Req: DeserializeOwned,
    Resp: Serialize + 'static,
    H: Fn(Req) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Resp>> + Send + 'static,
{
    fn call(&self, data: Value) -> BoxFuture<Result<Value, RpcErrorPayload>> {
        let request: Req = match serde_json::from_value(data) {
            Ok(request) => request,
            Err(e) => {
                let payload = validation_failure(&e);
                return Box::pin(async move { Err(payload) });
            }
        };

        let fut = (self.handler)(request);
        Box::pin(async move {
            let response = fut.await.map_err(normalize_failure)?;
            serde_json::to_value(response).map_err(|e| {
                error!(error = %e, "Failed to serialize handler response");
                RpcErrorPayload::new(
                    RpcErrorCode::InternalServerError,
                    RpcErrorCode::InternalServerError.default_message(),
                )
            })
        })
    }
}

/// Request decoding failed before the handler ran
fn validation_failure(err: &serde_json::Error) -> RpcErrorPayload {
    RpcErrorPayload {
        code: RpcErrorCode::ValidationError,
        message: RpcErrorCode::ValidationError.default_message().to_string(),
        details: Some(json!({ "error": err.to_string() })),
    }
}

/// Boundary normalization for handler failures.
///
/// Tagged [`RpcError`]s pass through unchanged. Anything else is reported as
/// `INTERNAL_SERVER_ERROR` without details; the original is only logged.
pub fn normalize_failure(err: anyhow::Error) -> RpcErrorPayload {
    match err.downcast::<RpcError>() {
        Ok(rpc) => rpc.into_payload(),
        Err(other) => {
            error!(error = %other, "Untagged failure in message handler");
            RpcErrorPayload::new(
                RpcErrorCode::InternalServerError,
                RpcErrorCode::InternalServerError.default_message(),
            )
        }
    }
}

/// Dispatch table for one downstream service
pub struct MessageRouter {
    service: String,
    routes: HashMap<String, Box<dyn Handler>>,
}

impl MessageRouter {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            routes: HashMap::new(),
        }
    }

    /// Name of the service this router answers for
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Register `handler` under `pattern`, replacing any previous handler.
    ///
    /// The request payload is decoded into `Req`; a decode failure never
    /// reaches the handler and is reported as `VALIDATION_ERROR`.
    pub fn route<Req, Resp, H, Fut>(mut self, pattern: &str, handler: H) -> Self
    where
        Req: DeserializeOwned + 'static,
        Resp: Serialize + 'static,
        H: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Resp>> + Send + 'static,
    {
        debug!(service = %self.service, pattern, "Registering message handler");
        self.routes.insert(
            pattern.to_string(),
            Box::new(TypedHandler {
                handler,
                _phantom: PhantomData::<fn(Req) -> Resp>,
            }),
        );
        self
    }

    /// Registered patterns, sorted
    pub fn patterns(&self) -> Vec<&str> {
        let mut patterns: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        patterns.sort_unstable();
        patterns
    }

    /// Run the handler registered for `pattern`
    pub fn dispatch(
        &self,
        pattern: &str,
        data: Value,
    ) -> BoxFuture<Result<Value, RpcErrorPayload>> {
        match self.routes.get(pattern) {
            Some(handler) => handler.call(data),
            None => {
                debug!(service = %self.service, pattern, "No handler for pattern");
                let payload = RpcErrorPayload::new(
                    RpcErrorCode::NotFound,
                    format!("No handler registered for pattern {}", pattern),
                );
                Box::pin(async move { Err(payload) })
            }
        }
    }
}
