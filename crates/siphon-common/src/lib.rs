//! Siphon Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the Siphon workspace.
//!
//! # Overview
//!
//! This crate provides functionality used by both the relay server and the
//! operator CLI:
//!
//! - **Error Handling**: the shared [`CommonError`] and `Result` alias
//! - **Logging**: tracing subscriber setup with console/file output
//! - **Types**: run reports and health payloads exchanged over the API
//!
//! # Example
//!
//! ```no_run
//! use siphon_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> siphon_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use types::{HealthStatus, RunReport, RunRequest};
