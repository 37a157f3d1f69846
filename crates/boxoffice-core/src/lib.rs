//! boxoffice-core - Core traits and types for the service mesh
//!
//! This crate provides the data model exchanged between the gateway and its
//! downstream services, the closed RPC error taxonomy, and the
//! [`ServiceClient`] capability every transport implements.

pub mod client;
pub mod error;
pub mod models;

pub use client::{ClientError, ClientResult, ServiceClient};
pub use error::{RpcError, RpcErrorCode, RpcErrorPayload, DEFAULT_FAILURE_MESSAGE};
pub use models::*;
