//! Relay pipeline
//!
//! Stages a queued message passes through on its way to the warehouse:
//!
//! - **normalize**: parse the payload, resolve its target table, flatten it
//!   into a typed record
//! - **sanitize**: map raw names onto warehouse-safe identifiers
//! - **schema**: infer record schemas and reconcile them against warehouse
//!   tables, creating or widening tables as needed
//! - **batch**: buffer records per table until a batch fills
//! - **dispatch**: load a batch and split it into per-row outcomes
//! - **stats**: accumulate run counters and seal them into a report
//! - **run**: the coordinator driving one drain-flush cycle end to end

pub mod batch;
pub mod dispatch;
pub mod normalize;
pub mod record;
pub mod run;
pub mod sanitize;
pub mod schema;
pub mod stats;

pub use run::{RunCoordinator, RunPhase};
