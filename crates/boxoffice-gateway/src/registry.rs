//! Registry of downstream client handles
//!
//! Handles are injected explicitly at construction; the registry is read-only
//! once the gateway starts serving.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use boxoffice_core::{ClientError, ClientResult, ServiceClient, ServiceIdentity};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult};

/// Send one message, treating a missing response after `timeout` exactly like
/// a transport failure
pub async fn bounded_call(
    client: &dyn ServiceClient,
    pattern: &str,
    data: Value,
    timeout: Duration,
) -> ClientResult<Value> {
    match tokio::time::timeout(timeout, client.send(pattern, data)).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout(timeout)),
    }
}

/// Downstream client handles keyed by service name
pub struct ServiceRegistry {
    clients: HashMap<String, Arc<dyn ServiceClient>>,
    request_timeout: Duration,
}

impl ServiceRegistry {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            request_timeout,
        }
    }

    /// Build a registry from a list of handles
    pub fn with_clients(
        clients: impl IntoIterator<Item = Arc<dyn ServiceClient>>,
        request_timeout: Duration,
    ) -> Self {
        let mut registry = Self::new(request_timeout);
        for client in clients {
            registry.register(client);
        }
        registry
    }

    /// Register a client under its identity's name.
    /// Returns the handle it replaced, if any.
    pub fn register(&mut self, client: Arc<dyn ServiceClient>) -> Option<Arc<dyn ServiceClient>> {
        let name = client.name().to_string();
        info!(service = %name, address = %client.identity().address, "Registering service");
        let replaced = self.clients.insert(name.clone(), client);
        if replaced.is_some() {
            warn!(service = %name, "Replaced previously registered service");
        }
        replaced
    }

    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn ServiceClient>> {
        let removed = self.clients.remove(name);
        if removed.is_some() {
            info!(service = %name, "Unregistered service");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ServiceClient>> {
        self.clients.get(name)
    }

    /// Registered service names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered identities, sorted by name
    pub fn identities(&self) -> Vec<ServiceIdentity> {
        let mut identities: Vec<ServiceIdentity> = self
            .clients
            .values()
            .map(|c| c.identity().clone())
            .collect();
        identities.sort_by(|a, b| a.name.cmp(&b.name));
        identities
    }

    /// All handles, sorted by name
    pub fn clients(&self) -> Vec<Arc<dyn ServiceClient>> {
        let mut clients: Vec<Arc<dyn ServiceClient>> = self.clients.values().cloned().collect();
        clients.sort_by(|a, b| a.name().cmp(b.name()));
        clients
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Relay a message pattern to the named service under the request timeout
    pub async fn call(&self, name: &str, pattern: &str, data: Value) -> GatewayResult<Value> {
        let client = self
            .get(name)
            .ok_or_else(|| GatewayError::UnknownService(name.to_string()))?;

        debug!(service = %name, pattern, "Relaying message");
        bounded_call(client.as_ref(), pattern, data, self.request_timeout)
            .await
            .map_err(|source| GatewayError::Client {
                service: name.to_string(),
                source,
            })
    }
}
