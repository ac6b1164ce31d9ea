//! Run statistics

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use siphon_common::RunReport;

use super::record::TableName;

/// Statistics collected during one relay run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Messages acknowledged after warehouse acceptance
    pub messages_processed: u64,
    /// Destination tables that accepted at least one row
    pub tables_updated: BTreeSet<String>,
    /// Error descriptions in arrival order
    pub errors: Vec<String>,
    /// Duration in seconds, sealed by [`complete`](Self::complete)
    pub duration_secs: f64,
    /// Start time
    pub started_at: Option<DateTime<Utc>>,
    /// End time
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunStats {
    /// Create new stats with the run clock started
    pub fn new() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Mark the run finished and seal its duration
    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
        if let (Some(start), Some(end)) = (self.started_at, self.completed_at) {
            self.duration_secs = (end - start).num_milliseconds() as f64 / 1000.0;
        }
    }

    /// Count one acknowledged message
    pub fn inc_processed(&mut self) {
        self.messages_processed += 1;
    }

    /// Record a table that accepted rows
    pub fn mark_table_updated(&mut self, table: &TableName) {
        self.tables_updated.insert(table.as_str().to_string());
    }

    /// Append one error description
    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Calculate messages per second, guarding a zero duration
    pub fn messages_per_second(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.messages_processed as f64 / self.duration_secs
        } else {
            0.0
        }
    }

    /// Snapshot into the report returned to the caller
    pub fn into_report(self) -> RunReport {
        let messages_per_second = self.messages_per_second();
        RunReport {
            messages_processed: self.messages_processed,
            tables_updated: self.tables_updated.into_iter().collect(),
            errors: self.errors,
            duration_seconds: self.duration_secs,
            messages_per_second,
        }
    }
}
