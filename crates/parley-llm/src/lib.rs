//! # parley-llm
//!
//! LLM adapters for Parley agents.
//!
//! Provides the [`LLMAdapter`] trait, an OpenAI implementation, and
//! [`RetryPolicy`] for bounded retry with exponential backoff around
//! transient provider failures.

mod error;
mod openai;
mod retry;
mod traits;

pub use error::LLMError;
pub use openai::OpenAiAdapter;
pub use retry::RetryPolicy;
pub use traits::{LLMAdapter, LLMMessage, LLMResponse, Role, TokenUsage};
