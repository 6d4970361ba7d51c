//! Short code generation.
//!
//! Draws random alphanumeric codes and asks the caller's uniqueness check
//! before accepting one. The check is advisory (the store's unique
//! constraint is the final arbiter at persistence time), so a clean draw
//! here can still lose a race and trigger regeneration. The attempt count
//! is hard-capped: under code-space exhaustion we fail loudly instead of
//! spinning.

use std::future::Future;

use tracing::debug;

use crate::errors::{Result, SnaplinkError};
use crate::utils::generate_random_code;

pub struct CodeGenerator {
    length: usize,
    max_attempts: usize,
}

impl CodeGenerator {
    pub fn new(length: usize, max_attempts: usize) -> Self {
        Self {
            length,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Generate a code that `is_unique` accepts, or fail with
    /// `GenerationExhausted` after the configured number of draws.
    pub async fn generate<F, Fut>(&self, is_unique: F) -> Result<String>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        for attempt in 1..=self.max_attempts {
            let code = generate_random_code(self.length);
            if is_unique(code.clone()).await? {
                return Ok(code);
            }
            debug!(
                "Short code collision on attempt {}/{}: {}",
                attempt, self.max_attempts, code
            );
        }

        Err(SnaplinkError::generation_exhausted(format!(
            "No unique code of length {} after {} attempts",
            self.length, self.max_attempts
        )))
    }
}
