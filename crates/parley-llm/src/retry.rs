//! Bounded retry with exponential backoff around LLM calls.

use std::time::Duration;

use tracing::warn;

use crate::{
    error::LLMError,
    traits::{LLMAdapter, LLMMessage, LLMResponse},
};

/// Retry policy for transient provider failures.
///
/// Non-transient errors (auth, configuration, empty response) fail
/// immediately; see [`LLMError::is_transient`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on the backoff delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff delay before retry number `attempt` (0-indexed).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Call `generate` with bounded retry on transient failures.
    ///
    /// # Errors
    ///
    /// Returns the last provider error once attempts are exhausted, or the
    /// first non-transient error.
    pub async fn generate<L: LLMAdapter + ?Sized>(
        &self,
        llm: &L,
        messages: &[LLMMessage],
    ) -> Result<LLMResponse, LLMError> {
        let mut attempt = 0u32;

        loop {
            match llm.generate(messages).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt + 1 < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        provider = %llm.provider(),
                        attempt = attempt + 1,
                        delay_ms = %delay.as_millis(),
                        error = %e,
                        "LLM call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
