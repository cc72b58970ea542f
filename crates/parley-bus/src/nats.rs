//! NATS message bus implementation.

use async_nats::Client;
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info};

use parley_core::Envelope;

use crate::{
    error::BusError,
    traits::{Channel, EnvelopeStream, MessageBus},
};

/// NATS-based message bus.
pub struct NatsBus {
    client: Client,
    url: String,
}

impl NatsBus {
    /// Connect to a NATS server.
    ///
    /// # Errors
    ///
    /// Returns an error if connection fails.
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        info!(url = %url, "Connecting to NATS");

        let client = async_nats::connect(url)
            .await
            .map_err(|e| BusError::ConnectionFailed(e.to_string()))?;

        info!("Connected to NATS");

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Get the connection URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl MessageBus for NatsBus {
    fn channel(&self, subject: &str) -> Box<dyn Channel> {
        Box::new(NatsChannel {
            client: self.client.clone(),
            subject: subject.to_string(),
        })
    }

    fn is_connected(&self) -> bool {
        self.client.connection_state() == async_nats::connection::State::Connected
    }

    async fn disconnect(&self) -> Result<(), BusError> {
        info!("Disconnecting from NATS");
        self.client
            .drain()
            .await
            .map_err(|e| BusError::DisconnectFailed(e.to_string()))
    }
}

/// A NATS channel for a specific subject.
struct NatsChannel {
    client: Client,
    subject: String,
}

#[async_trait]
impl Channel for NatsChannel {
    async fn publish(&self, envelope: &Envelope) -> Result<(), BusError> {
        let payload = serde_json::to_vec(envelope)
            .map_err(|e| BusError::SerializationError(e.to_string()))?;

        debug!(subject = %self.subject, correlation_id = %envelope.correlation_id(), "Publishing envelope");

        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| BusError::PublishFailed(e.to_string()))
    }

    async fn subscribe(&self) -> Result<EnvelopeStream, BusError> {
        debug!(subject = %self.subject, "Subscribing to subject");

        let subscriber = self
            .client
            .subscribe(self.subject.clone())
            .await
            .map_err(|e| BusError::SubscribeFailed(e.to_string()))?;

        // Payloads that fail to parse are dropped; at-least-once delivery
        // means the publisher retries on its own schedule.
        let stream = subscriber
            .filter_map(|msg| async move { serde_json::from_slice::<Envelope>(&msg.payload).ok() });

        Ok(Box::pin(stream))
    }
}
