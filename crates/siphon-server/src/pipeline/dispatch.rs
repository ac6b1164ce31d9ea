//! Batch dispatch to the warehouse

use thiserror::Error;
use tracing::{debug, warn};

use super::batch::PendingMessage;
use super::record::TableName;
use crate::queue::DeliveryHandle;
use crate::warehouse::{RowOutcome, Warehouse, WarehouseError};

/// Load failures, per row or per call
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("row {index} rejected by table {table}: {reason}")]
    PartialRejection {
        table: TableName,
        index: usize,
        reason: String,
    },

    #[error("bulk insert failed for table {table}: {source}")]
    TransportFailure {
        table: TableName,
        source: WarehouseError,
    },
}

/// Outcome of flushing one batch: handles to acknowledge, handles to
/// requeue, and the errors behind the requeues
#[derive(Debug)]
pub struct DispatchOutcome {
    pub table: TableName,
    pub accepted: Vec<DeliveryHandle>,
    pub rejected: Vec<DeliveryHandle>,
    pub errors: Vec<LoadError>,
}

/// Flushes one batch per call: a single bulk insert, resolved into
/// per-message outcomes.
pub struct LoadDispatcher<'a> {
    warehouse: &'a dyn Warehouse,
}

impl<'a> LoadDispatcher<'a> {
    pub fn new(warehouse: &'a dyn Warehouse) -> Self {
        Self { warehouse }
    }

    pub async fn dispatch(&self, table: TableName, batch: Vec<PendingMessage>) -> DispatchOutcome {
        let mut records = Vec::with_capacity(batch.len());
        let mut handles = Vec::with_capacity(batch.len());
        for message in batch {
            records.push(message.record);
            handles.push(message.handle);
        }

        debug!(table = %table, rows = records.len(), "Dispatching batch");

        match self.warehouse.insert_rows(&table, &records).await {
            Ok(outcomes) if outcomes.len() == handles.len() => {
                let mut accepted = Vec::new();
                let mut rejected = Vec::new();
                let mut errors = Vec::new();
                for (index, (handle, outcome)) in handles.into_iter().zip(outcomes).enumerate() {
                    match outcome {
                        RowOutcome::Accepted => accepted.push(handle),
                        RowOutcome::Rejected(reason) => {
                            errors.push(LoadError::PartialRejection {
                                table: table.clone(),
                                index,
                                reason,
                            });
                            rejected.push(handle);
                        },
                    }
                }
                DispatchOutcome {
                    table,
                    accepted,
                    rejected,
                    errors,
                }
            },
            Ok(outcomes) => {
                // Every handle must still be resolved, so a warehouse that
                // misreports row outcomes rejects the whole batch.
                warn!(
                    table = %table,
                    expected = handles.len(),
                    got = outcomes.len(),
                    "Row outcome count mismatch; whole batch rejected"
                );
                let error = LoadError::TransportFailure {
                    table: table.clone(),
                    source: WarehouseError::Rejected(format!(
                        "outcome count mismatch: expected {}, got {}",
                        handles.len(),
                        outcomes.len()
                    )),
                };
                DispatchOutcome {
                    table,
                    accepted: Vec::new(),
                    rejected: handles,
                    errors: vec![error],
                }
            },
            Err(source) => {
                warn!(table = %table, error = %source, "Bulk insert failed; whole batch rejected");
                let error = LoadError::TransportFailure {
                    table: table.clone(),
                    source,
                };
                DispatchOutcome {
                    table,
                    accepted: Vec::new(),
                    rejected: handles,
                    errors: vec![error],
                }
            },
        }
    }
}
