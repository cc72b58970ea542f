//! Orchestrator error types.

use thiserror::Error;

use parley_bus::BusError;
use parley_storage::{RegistryError, StorageError};

/// Errors that abort an orchestrator run.
///
/// Infrastructure variants (`Store`, `Bus`, `Registry`, `Interrupted`)
/// leave the persisted workflow `Running` so a later instance can resume.
/// Logical failures (timeout, generation failure) are not surfaced here:
/// they are persisted as `Failed` and returned as the final state.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// The registry has no agents to select from
    #[error("No agents registered")]
    NoAgents,

    /// A pending or selected agent vanished from the registry
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// Conditional state write lost twice; another orchestrator instance
    /// owns this workflow
    #[error("Workflow state conflict on {0}: duplicate orchestrator instance")]
    StateConflict(String),

    /// Shutdown was requested while a turn was in flight
    #[error("Orchestrator interrupted by shutdown")]
    Interrupted,

    /// The result subscription ended unexpectedly
    #[error("Result subscription for workflow {0} ended")]
    SubscriptionClosed(String),

    /// Underlying store failure
    #[error(transparent)]
    Store(#[from] StorageError),

    /// Underlying bus failure
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Registry failure
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
