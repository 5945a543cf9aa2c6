//! Durable work queue carrying committed events to the relay.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{EventEnvelope, EventStoreError, Result};

/// A message carried by the durable work queue.
///
/// Committed events are wrapped in an envelope of this kind inside the
/// same transaction that persists them, which is what makes the outbox
/// pattern crash-safe: either both the event and its queue entry exist,
/// or neither does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum QueuedMessage {
    /// A committed domain event awaiting relay to the in-process bus.
    DomainEvent(EventEnvelope),
}

/// A single at-least-once delivery of a queued message.
#[derive(Debug)]
pub struct Delivery {
    /// The message being delivered.
    pub message: QueuedMessage,

    /// 1-based delivery attempt counter.
    pub attempt: u32,

    pub(crate) receipt: Option<i64>,
}

/// At-least-once work queue abstraction.
///
/// `dequeue` waits for the next delivery and returns `None` once the
/// queue is closed and drained. A delivery must be either `ack`ed
/// (done) or `nack`ed (redeliver, or dead-letter after the configured
/// number of attempts).
#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn enqueue(&self, message: QueuedMessage) -> Result<()>;

    async fn dequeue(&self) -> Result<Option<Delivery>>;

    async fn ack(&self, delivery: Delivery) -> Result<()>;

    async fn nack(&self, delivery: Delivery) -> Result<()>;
}

/// In-memory work queue backed by an unbounded channel.
///
/// Redelivery is implemented by re-enqueueing on `nack` until
/// `max_deliveries` is reached, after which the message lands on the
/// dead-letter list where it stays inspectable instead of vanishing
/// into a log line.
pub struct InMemoryWorkQueue {
    tx: Mutex<Option<mpsc::UnboundedSender<(QueuedMessage, u32)>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<(QueuedMessage, u32)>>,
    dead: Mutex<Vec<QueuedMessage>>,
    max_deliveries: u32,
}

impl InMemoryWorkQueue {
    /// Creates a queue that dead-letters after `max_deliveries` attempts.
    pub fn new(max_deliveries: u32) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            dead: Mutex::new(Vec::new()),
            max_deliveries: max_deliveries.max(1),
        }
    }

    /// Enqueues a message synchronously.
    ///
    /// The in-memory event store calls this while holding its write
    /// lock so that commit and enqueue are a single atomic step.
    pub fn push(&self, message: QueuedMessage) -> Result<()> {
        self.send(message, 1)
    }

    /// Closes the queue; `dequeue` returns `None` once drained.
    pub fn close(&self) {
        self.tx.lock().unwrap().take();
    }

    /// Messages that exhausted their delivery attempts.
    pub fn dead_letters(&self) -> Vec<QueuedMessage> {
        self.dead.lock().unwrap().clone()
    }

    fn send(&self, message: QueuedMessage, attempt: u32) -> Result<()> {
        let guard = self.tx.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => tx
                .send((message, attempt))
                .map_err(|_| EventStoreError::QueueClosed),
            None => Err(EventStoreError::QueueClosed),
        }
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn enqueue(&self, message: QueuedMessage) -> Result<()> {
        self.push(message)
    }

    async fn dequeue(&self) -> Result<Option<Delivery>> {
        let mut rx = self.rx.lock().await;
        Ok(rx.recv().await.map(|(message, attempt)| Delivery {
            message,
            attempt,
            receipt: None,
        }))
    }

    async fn ack(&self, _delivery: Delivery) -> Result<()> {
        Ok(())
    }

    async fn nack(&self, delivery: Delivery) -> Result<()> {
        if delivery.attempt >= self.max_deliveries {
            tracing::error!(
                attempt = delivery.attempt,
                "delivery attempts exhausted, dead-lettering message"
            );
            metrics::counter!("outbox_dead_letters").increment(1);
            self.dead.lock().unwrap().push(delivery.message);
            return Ok(());
        }

        // A closed queue during shutdown also dead-letters so nothing
        // is silently dropped.
        if self.send(delivery.message.clone(), delivery.attempt + 1).is_err() {
            self.dead.lock().unwrap().push(delivery.message);
        }
        Ok(())
    }
}
