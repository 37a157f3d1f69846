//! boxoffice-gateway - Downstream service registry and health aggregation
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Gateway                               │
//! │                                                                  │
//! │  ┌──────────────────────────────────────────────────────────┐    │
//! │  │  ServiceRegistry / HealthAggregator                      │    │
//! │  │  - Holds one client handle per downstream service        │    │
//! │  │  - Bounds every call with the configured timeout         │    │
//! │  │  - Fans `service.ping` out to all services concurrently  │    │
//! │  └───────────────────────────┬──────────────────────────────┘    │
//! │                              │                                   │
//! │              ┌───────────────┼───────────────┐                   │
//! │              ▼               ▼               ▼                   │
//! │      ┌──────────────┐ ┌──────────────┐ ┌──────────────┐          │
//! │      │   catalog    │ │    media     │ │    search    │          │
//! │      │ (TcpClient)  │ │ (TcpClient)  │ │ (TcpClient)  │          │
//! │      └──────────────┘ └──────────────┘ └──────────────┘          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use boxoffice_gateway::{HealthAggregator, ServiceRegistry};
//! use boxoffice_rpc::TcpClient;
//!
//! let mut registry = ServiceRegistry::new(Duration::from_secs(3));
//! registry.register(Arc::new(TcpClient::new("catalog", "127.0.0.1", 4011)));
//!
//! let health = HealthAggregator::from_registry("gateway", &registry);
//! let report = health.check().await; // never fails
//! ```

mod error;
mod health;
mod registry;

pub use error::{GatewayError, GatewayResult};
pub use health::HealthAggregator;
pub use registry::{bounded_call, ServiceRegistry};

// Re-export core types for convenience
pub use boxoffice_core::{ClientError, HealthReport, PingOutcome, ServiceClient, ServiceIdentity};
