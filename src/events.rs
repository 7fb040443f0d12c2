//! # Event Pipeline
//!
//! Typed domain events and the queue that fans them out from the listener to the indexer.
//!
//! ## Overview
//!
//! [`EventQueue`] keeps one bounded buffer per subscriber. [`EventQueue::send`] delivers
//! every event to every subscriber registered at that moment, in registration order, and
//! waits for buffer space when a subscriber is full. Nothing is dropped: a stalled
//! subscriber stalls the producers, which is the backpressure the pipeline relies on.
//!
//! Subscribers only see events sent after they subscribed. Ordering holds per subscriber
//! and per `send` call; two producers sending concurrently may interleave.

use ethers::types::Address;
use num_bigint::{BigInt, BigUint};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use crate::shutdown::Shutdown;

/// Buffer size of each subscription.
pub const DEFAULT_EVENTS_BUFFER: usize = 256;

/// Kind tag of an [`Event`], mostly for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    PairCreation,
    ReservesUpdate,
    BlockCreation,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PairCreation => "PairCreation",
            EventType::ReservesUpdate => "ReservesUpdate",
            EventType::BlockCreation => "BlockCreation",
        }
    }
}

/// A pool appeared (or was discovered at startup) with its current reserves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairCreation {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub reserve0: BigUint,
    pub reserve1: BigUint,
}

/// Signed reserve movement of a pool. A zero delta leaves that side untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservesUpdate {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub reserve0_delta: BigInt,
    pub reserve1_delta: BigInt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCreation {
    pub block: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    PairCreation(PairCreation),
    ReservesUpdate(ReservesUpdate),
    BlockCreation(BlockCreation),
}

impl Event {
    pub fn event_type(&self) -> EventType {
        match self {
            Event::PairCreation(_) => EventType::PairCreation,
            Event::ReservesUpdate(_) => EventType::ReservesUpdate,
            Event::BlockCreation(_) => EventType::BlockCreation,
        }
    }
}

impl From<PairCreation> for Event {
    fn from(value: PairCreation) -> Self {
        Event::PairCreation(value)
    }
}

impl From<ReservesUpdate> for Event {
    fn from(value: ReservesUpdate) -> Self {
        Event::ReservesUpdate(value)
    }
}

impl From<BlockCreation> for Event {
    fn from(value: BlockCreation) -> Self {
        Event::BlockCreation(value)
    }
}

/// Errors of the event queue.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("send cancelled by shutdown after {delivered} events")]
    Cancelled { delivered: usize },
}

/// Receiving end handed to a subscriber.
pub type Subscription = mpsc::Receiver<Event>;

/// Multi-subscriber broadcast queue with blocking, bounded per-subscriber buffers.
pub struct EventQueue {
    subscribers: RwLock<Vec<mpsc::Sender<Event>>>,
    buffer: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_EVENTS_BUFFER)
    }

    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::with_capacity(16)),
            buffer: buffer.max(1),
        }
    }

    /// Register a subscriber. It receives every event sent from now on.
    pub async fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let mut subscribers = self.subscribers.write().await;
        subscribers.push(tx);
        debug!("📬 [EventQueue] Subscriber #{} registered", subscribers.len());
        rx
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Deliver each event to every subscriber, in order, blocking on full buffers.
    ///
    /// Returns [`QueueError::Cancelled`] if shutdown fires while waiting for space; events
    /// already delivered stay delivered.
    pub async fn send<I>(&self, events: I, shutdown: &Shutdown) -> Result<(), QueueError>
    where
        I: IntoIterator<Item = Event>,
    {
        // Snapshot so a slow subscriber does not hold the lock against `subscribe`.
        let subscribers = self.subscribers.read().await.clone();
        let mut shutdown = shutdown.clone();

        let mut delivered = 0;
        for event in events {
            for (index, subscriber) in subscribers.iter().enumerate() {
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => return Err(QueueError::Cancelled { delivered }),
                    sent = subscriber.send(event.clone()) => {
                        if sent.is_err() {
                            warn!(
                                "⚠️ [EventQueue] Subscriber #{} is gone, {} not delivered to it",
                                index + 1,
                                event.event_type().as_str()
                            );
                        }
                    }
                }
            }
            delivered += 1;
        }
        Ok(())
    }

    /// Convenience for a single event.
    pub async fn send_one(&self, event: impl Into<Event>, shutdown: &Shutdown) -> Result<(), QueueError> {
        self.send(std::iter::once(event.into()), shutdown).await
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
