//! Message bus between ingest and the indexer
//!
//! The indexer consumes raw event payloads through [`MessageSource`], which
//! delivers messages in order and only forgets a message once it has been
//! committed. Producers publish through [`MessageSink`].
//!
//! [`channel`] builds the in-process realization used by the all-in-one
//! service: a bounded tokio channel with per-message offsets and a committed
//! watermark.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;

/// A raw payload together with its position on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub offset: u64,
    pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Bus closed")]
    Closed,

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Commit failed: {0}")]
    Commit(String),
}

pub type BusResult<T> = Result<T, BusError>;

/// Ordered, manually-acknowledged message consumer
#[async_trait]
pub trait MessageSource: Send {
    /// Wait for the next message; `None` once the bus is closed and drained
    async fn fetch(&mut self) -> BusResult<Option<BusMessage>>;

    /// Acknowledge `message` and everything delivered before it
    async fn commit(&mut self, message: &BusMessage) -> BusResult<()>;
}

/// Message producer
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Publish a payload, returning its offset
    async fn publish(&self, payload: Vec<u8>) -> BusResult<u64>;
}

#[derive(Debug, Default)]
struct Offsets {
    /// Next offset to hand out
    next: Mutex<u64>,
    /// Every offset below this has been committed
    committed: AtomicU64,
}

/// Create an in-process bus holding at most `capacity` uncommitted messages in flight
pub fn channel(capacity: usize) -> (BusProducer, BusConsumer) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let offsets = Arc::new(Offsets::default());

    (
        BusProducer {
            tx,
            offsets: offsets.clone(),
        },
        BusConsumer {
            rx,
            offsets,
            delivered: 0,
        },
    )
}

/// Publishing half of the in-process bus
#[derive(Debug, Clone)]
pub struct BusProducer {
    tx: mpsc::Sender<BusMessage>,
    offsets: Arc<Offsets>,
}

impl BusProducer {
    /// Offsets below this value have been committed by the consumer
    pub fn committed(&self) -> u64 {
        self.offsets.committed.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl MessageSink for BusProducer {
    async fn publish(&self, payload: Vec<u8>) -> BusResult<u64> {
        // Wait for room first so the offset is only assigned once the send cannot block
        let permit = self.tx.reserve().await.map_err(|_| BusError::Closed)?;

        let mut next = self
            .offsets
            .next
            .lock()
            .map_err(|e| BusError::Publish(e.to_string()))?;
        let offset = *next;
        *next += 1;
        permit.send(BusMessage { offset, payload });

        Ok(offset)
    }
}

/// Consuming half of the in-process bus
#[derive(Debug)]
pub struct BusConsumer {
    rx: mpsc::Receiver<BusMessage>,
    offsets: Arc<Offsets>,
    /// Offsets below this have been handed out by `fetch`
    delivered: u64,
}

impl BusConsumer {
    pub fn committed(&self) -> u64 {
        self.offsets.committed.load(Ordering::SeqCst)
    }

    /// Messages fetched but not yet committed
    pub fn uncommitted(&self) -> u64 {
        self.delivered.saturating_sub(self.committed())
    }

    /// Stop accepting new messages; already queued ones can still be fetched
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[async_trait]
impl MessageSource for BusConsumer {
    async fn fetch(&mut self) -> BusResult<Option<BusMessage>> {
        let message = self.rx.recv().await;
        if let Some(ref message) = message {
            self.delivered = message.offset + 1;
        }
        Ok(message)
    }

    async fn commit(&mut self, message: &BusMessage) -> BusResult<()> {
        if message.offset >= self.delivered {
            return Err(BusError::Commit(format!(
                "offset {} has not been delivered",
                message.offset
            )));
        }
        self.offsets
            .committed
            .fetch_max(message.offset + 1, Ordering::SeqCst);
        Ok(())
    }
}
