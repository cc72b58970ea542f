//! # parley-core
//!
//! Shared protocol and domain types for the Parley multi-agent engine.
//!
//! This crate provides:
//! - [`AgentDescriptor`] - registry entry describing one persona service
//! - [`WorkflowState`] - the durable, resumable state of one workflow
//! - [`TaskEnvelope`] / [`ResultEnvelope`] - the bus protocol
//! - [`correlation_id`] - deterministic task/result correlation

pub mod protocol;
pub mod types;

pub use protocol::{correlation_id, Envelope, ResultEnvelope, TaskEnvelope, TaskError};
pub use types::{
    AgentDescriptor, FailureReason, Message, WorkflowState, WorkflowStatus, ORCHESTRATOR_NAME,
};
