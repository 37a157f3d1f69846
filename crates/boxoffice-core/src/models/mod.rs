//! Data models exchanged between the gateway and its downstream services

mod health;
mod service;

pub use health::*;
pub use service::*;
