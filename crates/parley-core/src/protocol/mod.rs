//! Bus protocol: envelopes exchanged between the orchestrator and agents.

mod envelope;

pub use envelope::{correlation_id, Envelope, ResultEnvelope, TaskEnvelope, TaskError};
