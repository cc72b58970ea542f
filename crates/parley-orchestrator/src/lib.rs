//! # parley-orchestrator
//!
//! The control-flow core of Parley: sequences agent turns over the bus,
//! owns durable workflow state, and terminates on a goal signal or an
//! iteration bound.
//!
//! The state machine is
//! `Initializing -> SelectingAgent -> AwaitingResult -> Evaluating ->
//! (SelectingAgent | Finalizing)`. Every transition is persisted before
//! the side effect it authorizes, so a crashed orchestrator resumes from
//! the last persisted state instead of restarting the workflow.

mod error;
mod orchestrator;
mod policy;
mod state;

pub use error::OrchestratorError;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use policy::{signal_predicate, GoalPredicate, RoundRobin, SelectionPolicy};
pub use state::WorkflowStore;
