//! Siphon Server Library
//!
//! Queue-to-warehouse relay service.
//!
//! # Overview
//!
//! The server drains a durable message queue, normalizes JSON payloads into
//! flat typed records, reconciles per-table schemas against an analytical
//! Postgres schema, and loads records in per-table batches:
//!
//! - **API Endpoints**: health probe plus a run trigger returning the report
//! - **Queue**: durable relay table drained with leased claims
//! - **Pipeline**: normalize, reconcile, batch, dispatch stages
//! - **Warehouse**: dynamic DDL and batched inserts over SQLx
//! - **Configuration**: environment-based configuration management
//!
//! # Architecture
//!
//! A run is a bounded drain-flush cycle:
//!
//! - **Draining**: messages are claimed from the queue in windows, each one
//!   normalized and buffered under its resolved table
//! - **Flushing**: a table's buffer flushes when it reaches the batch
//!   threshold, and every buffer flushes on the final drain
//! - **Resolution**: each delivery ends in exactly one ack or requeue;
//!   loaded messages are acked, failed ones requeued for a later run
//!
//! Both collaborators sit behind traits (`MessageQueue`, `Warehouse`) with
//! Postgres implementations for production and in-memory ones for tests.
//!
//! ## Framework Stack
//!
//! - **Axum**: HTTP surface
//! - **SQLx**: runtime-built queries against relay and warehouse tables
//! - **Tower**: middleware and service abstractions

pub mod api;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod warehouse;

// Re-export commonly used types
pub use error::{ApiResult, AppError};
