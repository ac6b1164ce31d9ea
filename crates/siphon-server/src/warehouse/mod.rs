//! Analytical store collaborators
//!
//! Destination tables live in one warehouse dataset (a Postgres schema). The
//! pipeline reaches the store through the [`Warehouse`] trait: existence and
//! schema introspection, additive DDL, and bulk inserts with per-row results.
//! [`PgWarehouse`] is the production implementation; [`MemoryWarehouse`]
//! backs tests.

pub mod memory;
pub mod postgres;

pub use memory::MemoryWarehouse;
pub use postgres::PgWarehouse;

use async_trait::async_trait;
use thiserror::Error;

use crate::pipeline::record::{Record, TableName, TableSchema};

/// Warehouse collaborator failures
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("warehouse backend error: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("warehouse unavailable: {0}")]
    Unavailable(String),

    #[error("warehouse rejected operation: {0}")]
    Rejected(String),
}

/// Result of one row within a bulk insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Accepted,
    Rejected(String),
}

impl RowOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, RowOutcome::Accepted)
    }
}

/// The analytical store destination tables live in.
///
/// `insert_rows` reports one [`RowOutcome`] per input row, in input order; a
/// whole-call `Err` means nothing was persisted.
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn table_exists(&self, table: &TableName) -> Result<bool, WarehouseError>;

    /// Current column set of an existing table
    async fn fetch_schema(&self, table: &TableName) -> Result<TableSchema, WarehouseError>;

    async fn create_table(
        &self,
        table: &TableName,
        columns: &TableSchema,
    ) -> Result<(), WarehouseError>;

    /// Additive only; existing columns are never retyped or removed
    async fn alter_table_add_columns(
        &self,
        table: &TableName,
        columns: &TableSchema,
    ) -> Result<(), WarehouseError>;

    async fn insert_rows(
        &self,
        table: &TableName,
        rows: &[Record],
    ) -> Result<Vec<RowOutcome>, WarehouseError>;
}
