//! In-process message bus backed by broadcast channels.
//!
//! Used by tests and single-process deployments. Matches the bus contract:
//! per-subject ordering, no replay for late subscribers, and fan-out to
//! every active subscriber.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use parley_core::Envelope;

use crate::{
    error::BusError,
    traits::{Channel, EnvelopeStream, MessageBus},
};

const DEFAULT_CAPACITY: usize = 256;

type Topics = Arc<Mutex<HashMap<String, broadcast::Sender<Envelope>>>>;

/// In-process message bus.
#[derive(Clone)]
pub struct MemoryBus {
    topics: Topics,
    capacity: usize,
}

impl MemoryBus {
    /// Create a bus with the default per-subject buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with a custom per-subject buffer.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            capacity,
        }
    }

    fn sender(&self, subject: &str) -> broadcast::Sender<Envelope> {
        let mut topics = self.topics.lock().expect("bus topics lock poisoned");
        topics
            .entry(subject.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    fn channel(&self, subject: &str) -> Box<dyn Channel> {
        Box::new(MemoryChannel {
            bus: self.clone(),
            subject: subject.to_string(),
        })
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn disconnect(&self) -> Result<(), BusError> {
        self.topics.lock().expect("bus topics lock poisoned").clear();
        Ok(())
    }
}

struct MemoryChannel {
    bus: MemoryBus,
    subject: String,
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn publish(&self, envelope: &Envelope) -> Result<(), BusError> {
        debug!(subject = %self.subject, correlation_id = %envelope.correlation_id(), "Publishing envelope");

        // A send error only means nobody is subscribed yet; pub/sub drops
        // messages without consumers.
        let _ = self.bus.sender(&self.subject).send(envelope.clone());
        Ok(())
    }

    async fn subscribe(&self) -> Result<EnvelopeStream, BusError> {
        let rx = self.bus.sender(&self.subject).subscribe();

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) => return Some((envelope, rx)),
                    // Dropped messages surface as a lag error; skip ahead.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(Box::pin(stream))
    }
}
