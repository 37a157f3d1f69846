//! In-process transport
//!
//! Dispatches straight into a [`MessageRouter`] living in the same process.
//! Error values go through the same wire encoding as the socket transport, so
//! callers cannot tell the two apart.

use std::sync::Arc;

use async_trait::async_trait;
use boxoffice_core::{ClientError, ClientResult, ServiceClient, ServiceIdentity};
use serde_json::Value;

use crate::router::MessageRouter;

/// [`ServiceClient`] backed by a router in the same process
pub struct LocalClient {
    identity: ServiceIdentity,
    router: Arc<MessageRouter>,
}

impl LocalClient {
    pub fn new(router: Arc<MessageRouter>) -> Self {
        Self {
            identity: ServiceIdentity::local(router.service()),
            router,
        }
    }
}

#[async_trait]
impl ServiceClient for LocalClient {
    fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    async fn send(&self, pattern: &str, data: Value) -> ClientResult<Value> {
        self.router
            .dispatch(pattern, data)
            .await
            .map_err(|payload| ClientError::Rpc(payload.to_wire()))
    }
}
