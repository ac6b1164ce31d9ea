//! In-memory queue for tests

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use super::{DeliveryHandle, MessageQueue, QueueError, RawMessage};

/// In-memory [`MessageQueue`] with ack/requeue journals.
///
/// Requeued payloads park in a separate pool, the in-memory stand-in for an
/// unexpired lease, and stay undeliverable until [`release_parked`] runs.
/// Dequeue can be scripted to fail once, standing in for queue connectivity
/// loss.
///
/// [`release_parked`]: MemoryQueue::release_parked
#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<(Uuid, Vec<u8>)>,
    in_flight: HashMap<Uuid, Vec<u8>>,
    parked: Vec<(Uuid, Vec<u8>)>,
    acked: Vec<Uuid>,
    requeued: Vec<Uuid>,
    fail_next_dequeue: bool,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed one message, returning its id
    pub fn push(&self, payload: impl Into<Vec<u8>>) -> Uuid {
        let id = Uuid::new_v4();
        self.state().ready.push_back((id, payload.into()));
        id
    }

    /// Make the next dequeue call fail once
    pub fn fail_next_dequeue(&self) {
        self.state().fail_next_dequeue = true;
    }

    /// Expire all leases: parked messages return to the back of the ready
    /// queue, as if enough time passed for a later run to see them
    pub fn release_parked(&self) {
        let mut state = self.state();
        let parked = std::mem::take(&mut state.parked);
        state.ready.extend(parked);
    }

    /// Ids acknowledged so far, in resolution order
    pub fn acked_ids(&self) -> Vec<Uuid> {
        self.state().acked.clone()
    }

    /// Ids requeued so far, in resolution order
    pub fn requeued_ids(&self) -> Vec<Uuid> {
        self.state().requeued.clone()
    }

    /// Messages waiting for delivery
    pub fn ready_len(&self) -> usize {
        self.state().ready.len()
    }

    /// Messages delivered but not yet acked or requeued
    pub fn in_flight_len(&self) -> usize {
        self.state().in_flight.len()
    }

    /// Requeued messages still waiting out their lease
    pub fn parked_len(&self) -> usize {
        self.state().parked.len()
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn dequeue(&self, max: usize) -> Result<Vec<RawMessage>, QueueError> {
        let mut state = self.state();

        if state.fail_next_dequeue {
            state.fail_next_dequeue = false;
            return Err(QueueError::Unavailable("simulated queue outage".to_string()));
        }

        let mut messages = Vec::new();
        while messages.len() < max {
            let Some((id, payload)) = state.ready.pop_front() else {
                break;
            };
            state.in_flight.insert(id, payload.clone());
            messages.push(RawMessage {
                payload,
                handle: DeliveryHandle::new(id),
            });
        }

        Ok(messages)
    }

    async fn ack(&self, handle: DeliveryHandle) -> Result<(), QueueError> {
        let mut state = self.state();
        let id = handle.id();

        if state.in_flight.remove(&id).is_none() {
            return Err(QueueError::UnknownHandle(id));
        }
        state.acked.push(id);

        Ok(())
    }

    async fn requeue(&self, handle: DeliveryHandle) -> Result<(), QueueError> {
        let mut state = self.state();
        let id = handle.id();

        let Some(payload) = state.in_flight.remove(&id) else {
            return Err(QueueError::UnknownHandle(id));
        };
        state.requeued.push(id);
        state.parked.push((id, payload));

        Ok(())
    }

    async fn depth(&self) -> Result<i64, QueueError> {
        Ok(self.state().ready.len() as i64)
    }
}
