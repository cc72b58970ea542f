//! Bus error types.

use thiserror::Error;

/// Errors that can occur with the message bus.
#[derive(Error, Debug)]
pub enum BusError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Disconnection failed
    #[error("Disconnect failed: {0}")]
    DisconnectFailed(String),

    /// Publish failed
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    /// Subscribe failed
    #[error("Subscribe failed: {0}")]
    SubscribeFailed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}
