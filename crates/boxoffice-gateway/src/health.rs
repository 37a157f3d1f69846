//! Gateway Health Aggregator
//!
//! Pings every registered downstream service concurrently and folds the
//! results into one [`HealthReport`]. A failing, hung, or malformed service
//! only ever affects its own entry; the check itself cannot fail.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use boxoffice_core::{
    ClientError, GatewayStamp, HealthReport, PingOutcome, PingRequest, PingResult, ServiceClient,
    PING_PATTERN,
};
use futures::future::join_all;
use serde_json::json;
use tracing::{debug, warn};

use crate::registry::{bounded_call, ServiceRegistry};

/// Produces combined liveness reports for a fixed set of downstream services
pub struct HealthAggregator {
    gateway: String,
    clients: Vec<Arc<dyn ServiceClient>>,
    timeout: Duration,
}

impl HealthAggregator {
    /// `clients` are the downstream handles to ping; `timeout` bounds each ping
    pub fn new(
        gateway: impl Into<String>,
        clients: Vec<Arc<dyn ServiceClient>>,
        timeout: Duration,
    ) -> Self {
        Self {
            gateway: gateway.into(),
            clients,
            timeout,
        }
    }

    /// Aggregate over every service in `registry` using its request timeout
    pub fn from_registry(gateway: impl Into<String>, registry: &ServiceRegistry) -> Self {
        Self::new(gateway, registry.clients(), registry.request_timeout())
    }

    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    /// Ping all services and wait for every outcome
    pub async fn check(&self) -> HealthReport {
        let pings = self.clients.iter().map(|client| async move {
            let name = client.name().to_string();
            let outcome = self.ping(client.as_ref()).await;
            (name, outcome)
        });

        // Handles sharing a name fold into one entry; a dead outcome wins
        let mut services: BTreeMap<String, PingOutcome> = BTreeMap::new();
        for (name, outcome) in join_all(pings).await {
            match services.entry(name) {
                Entry::Vacant(slot) => {
                    slot.insert(outcome);
                }
                Entry::Occupied(mut slot) => {
                    warn!(service = %slot.key(), "Duplicate service handle in health check");
                    if slot.get().is_ok() && !outcome.is_ok() {
                        slot.insert(outcome);
                    }
                }
            }
        }
        let report = HealthReport::new(GatewayStamp::now(&self.gateway), services);

        if report.ok {
            debug!(services = report.services.len(), "All services alive");
        } else {
            let dead: Vec<&str> = report
                .services
                .iter()
                .filter(|(_, outcome)| !outcome.is_ok())
                .map(|(name, _)| name.as_str())
                .collect();
            warn!(?dead, "Health check found unreachable services");
        }

        report
    }

    /// Ping the single service called `name`, if it is one of ours
    pub async fn check_service(&self, name: &str) -> Option<PingOutcome> {
        let pings = self
            .clients
            .iter()
            .filter(|c| c.name() == name)
            .map(|client| self.ping(client.as_ref()));
        let outcomes = join_all(pings).await;

        let dead = outcomes.iter().position(|outcome| !outcome.is_ok());
        outcomes.into_iter().nth(dead.unwrap_or(0))
    }

    async fn ping(&self, client: &dyn ServiceClient) -> PingOutcome {
        let name = client.name();
        let request = json!(PingRequest::from_sender(&self.gateway));

        let result = bounded_call(client, PING_PATTERN, request, self.timeout)
            .await
            .and_then(|value| {
                serde_json::from_value::<PingResult>(value)
                    .map_err(|e| ClientError::Malformed(e.to_string()))
            });

        match result {
            Ok(result) => PingOutcome::alive(name, result),
            Err(e) => {
                warn!(service = %name, error = %e, "Service ping failed");
                PingOutcome::dead(name, e.to_string())
            }
        }
    }
}
