//! Service Ping Responder
//!
//! Every downstream service answers `service.ping` with a fresh
//! [`PingResult`] stamped with its own name. The request payload is accepted
//! in any shape; only the optional `from` tag is read, for logging.

use boxoffice_core::{PingResult, PING_PATTERN};
use serde_json::Value;
use tracing::trace;

use crate::router::MessageRouter;

/// Register the `service.ping` handler on `router`
pub fn register(router: MessageRouter) -> MessageRouter {
    let service = router.service().to_string();
    router.route(PING_PATTERN, move |data: Value| {
        let result = respond(&service, &data);
        async move { anyhow::Ok(result) }
    })
}

fn respond(service: &str, data: &Value) -> PingResult {
    let from = data.get("from").and_then(Value::as_str).unwrap_or("unknown");
    trace!(service, from, "Answering ping");
    PingResult::alive(service)
}
