//! Per-run schema reconciliation
//!
//! The reconciler makes sure a record's destination table exists and covers
//! every field the record carries, touching the warehouse as little as
//! possible: one introspection per table per run, additive column appends
//! only, and no retries once the warehouse rejects a structural change.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::record::{ColumnType, Record, TableName, TableSchema};
use crate::warehouse::{Warehouse, WarehouseError};

/// Schema reconciliation failures
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("create failed for table {table}: {source}")]
    CreateFailed {
        table: TableName,
        source: WarehouseError,
    },

    #[error("alter failed for table {table}: {source}")]
    AlterFailed {
        table: TableName,
        source: WarehouseError,
    },

    #[error("table {table} disabled after an earlier schema failure this run")]
    TableFailed { table: TableName },
}

/// Reconciles destination tables against incoming records for one run.
///
/// The cache is write-through: once a table is reconciled this run, its
/// cached schema is assumed current. A table whose create or alter is
/// rejected stays failed for the remainder of the run.
pub struct SchemaReconciler<'a> {
    warehouse: &'a dyn Warehouse,
    cache: HashMap<TableName, TableSchema>,
    failed: HashSet<TableName>,
}

impl<'a> SchemaReconciler<'a> {
    pub fn new(warehouse: &'a dyn Warehouse) -> Self {
        Self {
            warehouse,
            cache: HashMap::new(),
            failed: HashSet::new(),
        }
    }

    /// Column set a record needs; a field observed only as null maps to a
    /// string column.
    fn infer_schema(record: &Record) -> TableSchema {
        record
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.column_type().unwrap_or(ColumnType::Text),
                )
            })
            .collect()
    }

    /// Ensure `table` exists and covers every field of `record`
    pub async fn reconcile(
        &mut self,
        table: &TableName,
        record: &Record,
    ) -> Result<(), SchemaError> {
        if self.failed.contains(table) {
            return Err(SchemaError::TableFailed {
                table: table.clone(),
            });
        }

        let cached = match self.cache.get(table).cloned() {
            Some(schema) => schema,
            None => self.first_encounter(table, record).await?,
        };

        let missing: TableSchema = Self::infer_schema(record)
            .iter()
            .filter(|(name, _)| !cached.contains(name))
            .map(|(name, ty)| (name.to_string(), ty))
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        match self.warehouse.alter_table_add_columns(table, &missing).await {
            Ok(()) => {
                info!(table = %table, columns = missing.len(), "Appended columns to destination table");
                if let Some(schema) = self.cache.get_mut(table) {
                    schema.extend(&missing);
                }
                Ok(())
            },
            Err(source) => {
                warn!(table = %table, error = %source, "Column append rejected; table disabled for this run");
                self.failed.insert(table.clone());
                Err(SchemaError::AlterFailed {
                    table: table.clone(),
                    source,
                })
            },
        }
    }

    /// First sighting of a table this run: adopt the warehouse's current
    /// schema, or create the table from the record's inferred columns.
    async fn first_encounter(
        &mut self,
        table: &TableName,
        record: &Record,
    ) -> Result<TableSchema, SchemaError> {
        let exists = match self.warehouse.table_exists(table).await {
            Ok(exists) => exists,
            Err(source) => {
                self.failed.insert(table.clone());
                return Err(SchemaError::CreateFailed {
                    table: table.clone(),
                    source,
                });
            },
        };

        let schema = if exists {
            match self.warehouse.fetch_schema(table).await {
                Ok(schema) => {
                    debug!(table = %table, columns = schema.len(), "Adopted existing table schema");
                    schema
                },
                Err(source) => {
                    self.failed.insert(table.clone());
                    return Err(SchemaError::CreateFailed {
                        table: table.clone(),
                        source,
                    });
                },
            }
        } else {
            let inferred = Self::infer_schema(record);
            match self.warehouse.create_table(table, &inferred).await {
                Ok(()) => {
                    info!(table = %table, columns = inferred.len(), "Created destination table");
                    inferred
                },
                Err(source) => {
                    warn!(table = %table, error = %source, "Create rejected; table disabled for this run");
                    self.failed.insert(table.clone());
                    return Err(SchemaError::CreateFailed {
                        table: table.clone(),
                        source,
                    });
                },
            }
        };

        self.cache.insert(table.clone(), schema.clone());
        Ok(schema)
    }
}
