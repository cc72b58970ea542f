//! Agent runtime error types.

use thiserror::Error;

use parley_bus::BusError;
use parley_storage::RegistryError;

/// Errors that stop the agent runtime. Generation failures are not here:
/// they are reported through the result channel, never crash the service.
#[derive(Error, Debug)]
pub enum AgentRuntimeError {
    /// Could not register or deregister the agent
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Bus subscription or connection failure
    #[error(transparent)]
    Bus(#[from] BusError),

    /// The task subscription ended unexpectedly
    #[error("Task subscription for {0} ended")]
    SubscriptionClosed(String),
}
