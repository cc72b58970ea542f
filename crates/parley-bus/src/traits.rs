//! Traits for message bus implementations.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use parley_core::Envelope;

use crate::error::BusError;

/// Infinite stream of envelopes from a subscription. Restart by
/// resubscribing.
pub type EnvelopeStream = Pin<Box<dyn Stream<Item = Envelope> + Send>>;

/// A communication channel for a specific subject.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Publish an envelope to this subject. Fire-and-forget: delivery is
    /// at-least-once, not transactional with any state write.
    async fn publish(&self, envelope: &Envelope) -> Result<(), BusError>;

    /// Subscribe to envelopes on this subject. Consumption order matches
    /// publish order for this subject only.
    async fn subscribe(&self) -> Result<EnvelopeStream, BusError>;
}

/// Message bus for orchestrator/agent communication.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Create a channel for a subject.
    fn channel(&self, subject: &str) -> Box<dyn Channel>;

    /// Check if connected.
    fn is_connected(&self) -> bool;

    /// Disconnect from the bus.
    async fn disconnect(&self) -> Result<(), BusError>;
}
