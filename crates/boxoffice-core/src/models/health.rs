//! Aggregated health report produced by the gateway

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PingResult;

/// Outcome of pinging a single downstream service.
///
/// Serialized flat with an `ok` discriminator:
/// `{"ok": true, "message": ..., "result": {...}}` or
/// `{"ok": false, "message": ..., "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "OutcomeRepr", try_from = "OutcomeRepr")]
pub enum PingOutcome {
    Alive { message: String, result: PingResult },
    Dead { message: String, error: String },
}

impl PingOutcome {
    pub fn alive(service: &str, result: PingResult) -> Self {
        PingOutcome::Alive {
            message: format!("Service {} is alive", service),
            result,
        }
    }

    pub fn dead(service: &str, error: impl Into<String>) -> Self {
        PingOutcome::Dead {
            message: format!("Service {} is not alive", service),
            error: error.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, PingOutcome::Alive { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            PingOutcome::Alive { message, .. } | PingOutcome::Dead { message, .. } => message,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct OutcomeRepr {
    ok: bool,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<PingResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<PingOutcome> for OutcomeRepr {
    fn from(outcome: PingOutcome) -> Self {
        match outcome {
            PingOutcome::Alive { message, result } => OutcomeRepr {
                ok: true,
                message,
                result: Some(result),
                error: None,
            },
            PingOutcome::Dead { message, error } => OutcomeRepr {
                ok: false,
                message,
                result: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<OutcomeRepr> for PingOutcome {
    type Error = String;

    fn try_from(repr: OutcomeRepr) -> Result<Self, Self::Error> {
        match (repr.ok, repr.result, repr.error) {
            (true, Some(result), _) => Ok(PingOutcome::Alive {
                message: repr.message,
                result,
            }),
            (true, None, _) => Err("alive outcome without result".to_string()),
            (false, _, error) => Ok(PingOutcome::Dead {
                message: repr.message,
                error: error.unwrap_or_default(),
            }),
        }
    }
}

/// The gateway's own identity in a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayStamp {
    pub service: String,
    pub now: DateTime<Utc>,
}

impl GatewayStamp {
    pub fn now(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            now: Utc::now(),
        }
    }
}

/// Combined liveness report. `ok` is the AND over every service outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub ok: bool,
    pub gateway: GatewayStamp,
    /// Keyed by service name. A mapping, not a sequence.
    pub services: BTreeMap<String, PingOutcome>,
}

impl HealthReport {
    pub fn new(gateway: GatewayStamp, services: BTreeMap<String, PingOutcome>) -> Self {
        let ok = services.values().all(PingOutcome::is_ok);
        Self {
            ok,
            gateway,
            services,
        }
    }
}
