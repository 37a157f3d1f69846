//! Service identity and the `service.ping` message types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message pattern every downstream service answers for liveness
pub const PING_PATTERN: &str = "service.ping";

/// Default socket ports of the known downstream services
pub const WELL_KNOWN_SERVICES: [(&str, u16); 3] =
    [("catalog", 4011), ("media", 4012), ("search", 4013)];

/// Default socket port for a known service name
pub fn well_known_port(name: &str) -> Option<u16> {
    WELL_KNOWN_SERVICES
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, port)| *port)
}

/// Environment variable prefix for a service, e.g. `CATALOG` for `catalog`
pub fn env_prefix(name: &str) -> String {
    name.to_ascii_uppercase().replace('-', "_")
}

/// Where a downstream service can be reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum ServiceAddress {
    /// Direct socket connection
    Tcp { host: String, port: u16 },
    /// Dispatched within the same process
    Local,
}

impl fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceAddress::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            ServiceAddress::Local => f.write_str("local"),
        }
    }
}

/// A downstream service as configured at process start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    pub name: String,
    pub address: ServiceAddress,
}

impl ServiceIdentity {
    pub fn tcp(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            address: ServiceAddress::Tcp {
                host: host.into(),
                port,
            },
        }
    }

    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: ServiceAddress::Local,
        }
    }
}

/// Payload of a `service.ping` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingRequest {
    /// Sender identity tag, informational only
    pub from: String,
}

impl PingRequest {
    pub fn from_sender(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

/// Reply to a `service.ping` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResult {
    pub ok: bool,
    pub service: String,
    pub now: DateTime<Utc>,
}

impl PingResult {
    /// A fresh liveness stamp for `service`
    pub fn alive(service: impl Into<String>) -> Self {
        Self {
            ok: true,
            service: service.into(),
            now: Utc::now(),
        }
    }
}
