//! Bounded redelivery before dead-lettering.

use crate::error::PipelineError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// What happens to a message whose processing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Rejected with requeue, the broker delivers it again.
    Requeued,
    /// Rejected without requeue, routed to the dead-letter queue.
    DeadLettered,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn settle(&self, attempt: u32, err: &PipelineError) -> Settlement {
        if err.is_permanent() || attempt >= self.max_attempts {
            Settlement::DeadLettered
        } else {
            Settlement::Requeued
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}
