//! Per-table batch accumulation

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::record::{Record, TableName};
use crate::queue::DeliveryHandle;

/// One buffered message: the flattened record plus the delivery handle its
/// flush outcome will resolve
#[derive(Debug)]
pub struct PendingMessage {
    pub record: Record,
    pub handle: DeliveryHandle,
}

/// Buffers records per destination table and signals when a table's batch
/// reaches capacity.
///
/// Tables drain in first-buffered order, keeping the final drain
/// deterministic.
#[derive(Debug)]
pub struct BatchAccumulator {
    capacity: usize,
    order: Vec<TableName>,
    buffers: HashMap<TableName, Vec<PendingMessage>>,
}

impl BatchAccumulator {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: Vec::new(),
            buffers: HashMap::new(),
        }
    }

    /// Buffer one message; `true` means the table's batch reached capacity
    /// and must be flushed now
    pub fn add(&mut self, table: &TableName, message: PendingMessage) -> bool {
        let buffer = match self.buffers.entry(table.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.order.push(table.clone());
                entry.insert(Vec::new())
            },
        };
        buffer.push(message);
        buffer.len() >= self.capacity
    }

    /// Hand off a table's buffered batch; the table keeps its drain-order
    /// slot for records that arrive later
    pub fn take(&mut self, table: &TableName) -> Vec<PendingMessage> {
        self.buffers
            .get_mut(table)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Drain every non-empty batch in first-buffered table order
    pub fn drain(&mut self) -> Vec<(TableName, Vec<PendingMessage>)> {
        let mut drained = Vec::new();
        for table in &self.order {
            if let Some(batch) = self.buffers.get_mut(table) {
                if !batch.is_empty() {
                    drained.push((table.clone(), std::mem::take(batch)));
                }
            }
        }
        drained
    }

    /// Messages currently buffered across all tables
    pub fn buffered(&self) -> usize {
        self.buffers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buffered() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn pending() -> PendingMessage {
        PendingMessage {
            record: Record::new(),
            handle: DeliveryHandle::new(Uuid::new_v4()),
        }
    }

    #[test]
    fn test_signals_at_capacity() {
        let mut accumulator = BatchAccumulator::new(3);
        let table = TableName::new("orders");

        assert!(!accumulator.add(&table, pending()));
        assert!(!accumulator.add(&table, pending()));
        assert!(accumulator.add(&table, pending()));
    }

    #[test]
    fn test_tables_fill_independently() {
        let mut accumulator = BatchAccumulator::new(2);
        let orders = TableName::new("orders");
        let refunds = TableName::new("refunds");

        assert!(!accumulator.add(&orders, pending()));
        assert!(!accumulator.add(&refunds, pending()));
        assert!(accumulator.add(&orders, pending()));
        assert_eq!(accumulator.buffered(), 3);
    }

    #[test]
    fn test_take_empties_one_table() {
        let mut accumulator = BatchAccumulator::new(10);
        let orders = TableName::new("orders");
        let refunds = TableName::new("refunds");

        accumulator.add(&orders, pending());
        accumulator.add(&orders, pending());
        accumulator.add(&refunds, pending());

        let batch = accumulator.take(&orders);
        assert_eq!(batch.len(), 2);
        assert_eq!(accumulator.buffered(), 1);
    }

    #[test]
    fn test_drain_follows_first_buffered_order() {
        let mut accumulator = BatchAccumulator::new(10);
        let orders = TableName::new("orders");
        let refunds = TableName::new("refunds");
        let shipments = TableName::new("shipments");

        accumulator.add(&refunds, pending());
        accumulator.add(&orders, pending());
        accumulator.add(&shipments, pending());
        accumulator.add(&refunds, pending());

        let drained = accumulator.drain();
        let tables: Vec<&str> = drained.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(tables, vec!["refunds", "orders", "shipments"]);
        assert_eq!(drained[0].1.len(), 2);
        assert!(accumulator.is_empty());
    }

    #[test]
    fn test_table_keeps_order_slot_after_take() {
        let mut accumulator = BatchAccumulator::new(10);
        let orders = TableName::new("orders");
        let refunds = TableName::new("refunds");

        accumulator.add(&orders, pending());
        accumulator.add(&refunds, pending());
        accumulator.take(&orders);

        // A later record for the taken table reuses its original slot.
        accumulator.add(&orders, pending());

        let drained = accumulator.drain();
        let tables: Vec<&str> = drained.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(tables, vec!["orders", "refunds"]);
    }

    #[test]
    fn test_drain_skips_empty_buffers() {
        let mut accumulator = BatchAccumulator::new(10);
        let orders = TableName::new("orders");

        accumulator.add(&orders, pending());
        accumulator.take(&orders);

        assert!(accumulator.drain().is_empty());
    }
}
