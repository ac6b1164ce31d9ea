//! Run coordination
//!
//! One run drains the queue up to a cap, pushes each message through
//! normalize → reconcile → buffer, flushes batches as they fill, then force
//! flushes whatever remains. Every dequeued message resolves to exactly one
//! of ack or requeue before the report is returned.

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use siphon_common::RunReport;

use super::batch::{BatchAccumulator, PendingMessage};
use super::dispatch::{DispatchOutcome, LoadDispatcher};
use super::normalize::{normalize, Normalized};
use super::schema::{SchemaError, SchemaReconciler};
use super::stats::RunStats;
use crate::config::PipelineConfig;
use crate::queue::{DeliveryHandle, MessageQueue};
use crate::warehouse::Warehouse;

/// How many messages one dequeue call may claim
const PREFETCH_WINDOW: usize = 100;

/// Run lifecycle, logged at each transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Draining,
    Flushing,
    Done,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Draining => "draining",
            RunPhase::Flushing => "flushing",
            RunPhase::Done => "done",
        }
    }
}

/// Drives one relay run end to end
pub struct RunCoordinator<'a> {
    queue: &'a dyn MessageQueue,
    warehouse: &'a dyn Warehouse,
    config: PipelineConfig,
}

impl<'a> RunCoordinator<'a> {
    pub fn new(
        queue: &'a dyn MessageQueue,
        warehouse: &'a dyn Warehouse,
        config: PipelineConfig,
    ) -> Self {
        Self {
            queue,
            warehouse,
            config,
        }
    }

    /// Execute one run. Always produces a report; failures along the way
    /// land in its error list rather than aborting the run, except that a
    /// queue failure stops draining.
    pub async fn run(&self, max_messages: Option<i64>) -> RunReport {
        let cap = match max_messages {
            Some(n) if n > 0 => n,
            _ => self.config.max_messages,
        } as usize;
        let deadline = Instant::now() + Duration::from_secs(self.config.run_timeout_secs);

        info!(max_messages = cap, batch_size = self.config.batch_size, "Starting relay run");

        let mut stats = RunStats::new();
        let mut reconciler = SchemaReconciler::new(self.warehouse);
        let mut accumulator = BatchAccumulator::new(self.config.batch_size);
        let dispatcher = LoadDispatcher::new(self.warehouse);

        let mut phase = RunPhase::Idle;
        self.transition(&mut phase, RunPhase::Draining);

        let mut dequeued: usize = 0;
        'drain: while dequeued < cap {
            if Instant::now() >= deadline {
                warn!(
                    timeout_secs = self.config.run_timeout_secs,
                    dequeued,
                    "Run timeout reached; stopping drain"
                );
                break;
            }

            let window = PREFETCH_WINDOW.min(cap - dequeued);
            let messages = match self.queue.dequeue(window).await {
                Ok(messages) => messages,
                Err(e) => {
                    error!(error = %e, "Queue failure; ending run early");
                    stats.push_error(format!("queue failure: {e}"));
                    break 'drain;
                },
            };

            if messages.is_empty() {
                debug!(dequeued, "Queue exhausted");
                break;
            }

            for message in messages {
                dequeued += 1;
                let message_id = message.handle.id();

                let Normalized { table, record } = match normalize(&message.payload, Utc::now()) {
                    Ok(normalized) => normalized,
                    Err(e) => {
                        debug!(message_id = %message_id, error = %e, "Message failed normalization");
                        stats.push_error(format!("message {message_id}: {e}"));
                        self.requeue(message.handle, &mut stats).await;
                        continue;
                    },
                };

                if let Err(e) = reconciler.reconcile(&table, &record).await {
                    stats.push_error(e.to_string());
                    self.requeue(message.handle, &mut stats).await;

                    // A schema failure abandons the table for this run, so
                    // anything already buffered for it can no longer flush.
                    if matches!(
                        e,
                        SchemaError::CreateFailed { .. } | SchemaError::AlterFailed { .. }
                    ) {
                        let abandoned = accumulator.take(&table);
                        if !abandoned.is_empty() {
                            warn!(
                                table = %table,
                                messages = abandoned.len(),
                                "Requeueing batch buffered for failed table"
                            );
                            for pending in abandoned {
                                self.requeue(pending.handle, &mut stats).await;
                            }
                        }
                    }
                    continue;
                }

                let full = accumulator.add(
                    &table,
                    PendingMessage {
                        record,
                        handle: message.handle,
                    },
                );
                if full {
                    self.transition(&mut phase, RunPhase::Flushing);
                    let batch = accumulator.take(&table);
                    let outcome = dispatcher.dispatch(table, batch).await;
                    self.resolve(outcome, &mut stats).await;
                    self.transition(&mut phase, RunPhase::Draining);
                }
            }
        }

        // Final drain: remaining batches flush in first-buffered table
        // order; different tables dispatch concurrently, and their outcomes
        // fold into stats sequentially afterwards.
        self.transition(&mut phase, RunPhase::Flushing);
        let dispatches = accumulator
            .drain()
            .into_iter()
            .map(|(table, batch)| dispatcher.dispatch(table, batch));
        for outcome in futures::future::join_all(dispatches).await {
            self.resolve(outcome, &mut stats).await;
        }

        self.transition(&mut phase, RunPhase::Done);
        stats.complete();
        info!(
            messages_processed = stats.messages_processed,
            tables_updated = stats.tables_updated.len(),
            errors = stats.errors.len(),
            duration_secs = stats.duration_secs,
            "Run complete"
        );

        stats.into_report()
    }

    fn transition(&self, phase: &mut RunPhase, next: RunPhase) {
        debug!(from = phase.as_str(), to = next.as_str(), "Run phase transition");
        *phase = next;
    }

    /// Fold one flush outcome into stats and resolve its handles
    async fn resolve(&self, outcome: DispatchOutcome, stats: &mut RunStats) {
        let DispatchOutcome {
            table,
            accepted,
            rejected,
            errors,
        } = outcome;

        if !accepted.is_empty() {
            stats.mark_table_updated(&table);
        }
        for error in &errors {
            stats.push_error(error.to_string());
        }

        let accepted_count = accepted.len();
        let rejected_count = rejected.len();

        for handle in accepted {
            let message_id = handle.id();
            match self.queue.ack(handle).await {
                Ok(()) => stats.inc_processed(),
                Err(e) => {
                    // Not acknowledged, so not counted as processed.
                    error!(message_id = %message_id, error = %e, "Ack failed");
                    stats.push_error(format!("ack failed for message {message_id}: {e}"));
                },
            }
        }
        for handle in rejected {
            self.requeue(handle, stats).await;
        }

        info!(
            table = %table,
            accepted = accepted_count,
            rejected = rejected_count,
            "Flushed batch"
        );
    }

    /// Requeue with error tolerance: a failed requeue is recorded, not fatal
    async fn requeue(&self, handle: DeliveryHandle, stats: &mut RunStats) {
        let message_id = handle.id();
        if let Err(e) = self.queue.requeue(handle).await {
            error!(message_id = %message_id, error = %e, "Requeue failed");
            stats.push_error(format!("requeue failed for message {message_id}: {e}"));
        }
    }
}
