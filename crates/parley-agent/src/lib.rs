//! # parley-agent
//!
//! The agent runtime: one long-lived service wrapping one persona.
//!
//! On each task it builds a prompt from the persona and the task content,
//! calls the LLM with bounded retry, and publishes the result back on the
//! workflow's result subject. Tasks are processed one at a time; duplicate
//! bus deliveries replay the cached result for their correlation id
//! instead of triggering another generation.

mod error;
pub mod prompt;
mod runtime;

pub use error::AgentRuntimeError;
pub use runtime::{AgentRuntime, AgentRuntimeConfig, AgentStatus};
