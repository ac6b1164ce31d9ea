//! Message queue collaborators
//!
//! The pipeline drains a durable queue through the [`MessageQueue`] trait.
//! [`PgQueue`] is the production implementation over a Postgres relay table;
//! [`MemoryQueue`] backs tests.

pub mod memory;
pub mod postgres;

pub use memory::MemoryQueue;
pub use postgres::PgQueue;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Queue collaborator failures
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("queue unavailable: {0}")]
    Unavailable(String),

    #[error("unknown delivery handle {0}")]
    UnknownHandle(Uuid),
}

/// Opaque token identifying one dequeued message for later ack or requeue.
///
/// `ack` and `requeue` consume the handle by value, so each delivery is
/// resolved exactly once: one of the two outcomes, never both.
#[derive(Debug)]
pub struct DeliveryHandle {
    id: Uuid,
}

impl DeliveryHandle {
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }

    /// Message id, for error context and journaling
    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// One dequeued message: opaque payload bytes plus its delivery handle
#[derive(Debug)]
pub struct RawMessage {
    pub payload: Vec<u8>,
    pub handle: DeliveryHandle,
}

/// A durable message queue the relay drains
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Claim up to `max` messages for processing
    async fn dequeue(&self, max: usize) -> Result<Vec<RawMessage>, QueueError>;

    /// Permanently remove a delivered message
    async fn ack(&self, handle: DeliveryHandle) -> Result<(), QueueError>;

    /// Return a delivered message to the queue for a later run.
    ///
    /// Redelivery waits for the message's lease to lapse, so the run that
    /// claimed it never dequeues it a second time.
    async fn requeue(&self, handle: DeliveryHandle) -> Result<(), QueueError>;

    /// Number of messages currently available for delivery
    async fn depth(&self) -> Result<i64, QueueError>;
}
