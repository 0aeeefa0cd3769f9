//! Delivery job queue abstraction.
//!
//! The dispatcher hands delivery work to the worker pool through this
//! boundary. The job deliberately carries no signing secret: the worker
//! fetches the endpoint at execution time, so a rotation between enqueue
//! and execution is honored.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Payload of one queued delivery attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryJob {
    pub delivery_id: Uuid,
    pub endpoint_id: Uuid,
    pub org_id: Uuid,
    pub url: String,
    pub event_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub attempt_number: i32,
}

/// Queue transport errors.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue is full")]
    Full,

    #[error("Queue is closed")]
    Closed,
}

/// Hand-off point between the dispatcher and the delivery workers.
///
/// The transport guarantees at-most-one active consumer per job; it does
/// not guarantee ordering across endpoints.
#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    async fn enqueue(&self, job: DeliveryJob) -> Result<(), QueueError>;
}

/// Default capacity of the in-process queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// In-process queue backed by a bounded tokio mpsc channel.
#[derive(Clone)]
pub struct InProcessQueue {
    sender: tokio::sync::mpsc::Sender<DeliveryJob>,
}

impl InProcessQueue {
    /// Create a queue and its consumer half.
    pub fn new(capacity: usize) -> (Self, tokio::sync::mpsc::Receiver<DeliveryJob>) {
        let (sender, receiver) = tokio::sync::mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl DeliveryQueue for InProcessQueue {
    async fn enqueue(&self, job: DeliveryJob) -> Result<(), QueueError> {
        // A full queue is backpressure, not a reason to block the dispatcher.
        self.sender.try_send(job).map_err(|e| match e {
            tokio::sync::mpsc::error::TrySendError::Full(_) => QueueError::Full,
            tokio::sync::mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }
}
