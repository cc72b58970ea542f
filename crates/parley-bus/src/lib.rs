//! # parley-bus
//!
//! Message bus adapters for orchestrator/agent communication.
//!
//! Delivery is at-least-once and ordered per subject only; consumers must
//! be idempotent on correlation ids. Two implementations are provided:
//! [`NatsBus`] for distributed deployments and [`MemoryBus`] for tests and
//! single-process setups.

mod error;
mod memory;
mod nats;
mod patterns;
mod traits;

pub use error::BusError;
pub use memory::MemoryBus;
pub use nats::NatsBus;
pub use patterns::SubjectPatterns;
pub use traits::{Channel, EnvelopeStream, MessageBus};
