//! HTTP request handlers for the gateway API

pub mod health;
pub mod services;
