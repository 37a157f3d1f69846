//! Gateway error types

use boxoffice_core::ClientError;
use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// No client registered under this name
    #[error("Service not registered: {0}")]
    UnknownService(String),

    /// The downstream call itself failed
    #[error("Service {service} call failed: {source}")]
    Client {
        service: String,
        #[source]
        source: ClientError,
    },
}
