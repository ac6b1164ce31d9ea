//! API client module
//!
//! HTTP client for interacting with the relay server.

pub mod client;
pub mod endpoints;

pub use client::ApiClient;
