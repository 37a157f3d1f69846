//! Application state for the gateway API

use std::sync::Arc;

use axum::http::HeaderValue;
use boxoffice_gateway::{HealthAggregator, ServiceRegistry};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    registry: Arc<ServiceRegistry>,
    health: Arc<HealthAggregator>,
    /// Browser origin allowed to call the API with credentials
    cors_origin: Option<HeaderValue>,
}

impl AppState {
    /// Create state for a gateway called `gateway` fronting `registry`
    pub fn new(gateway: impl Into<String>, registry: ServiceRegistry) -> Self {
        let health = HealthAggregator::from_registry(gateway, &registry);
        Self {
            registry: Arc::new(registry),
            health: Arc::new(health),
            cors_origin: None,
        }
    }

    pub fn with_cors_origin(mut self, origin: HeaderValue) -> Self {
        self.cors_origin = Some(origin);
        self
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn health(&self) -> &HealthAggregator {
        &self.health
    }

    pub fn cors_origin(&self) -> Option<&HeaderValue> {
        self.cors_origin.as_ref()
    }
}
