//! Decision model: what to do with a delivery after the handler ran.
//!
//! This module defines the Decision type (what to do next) and the Decider trait
//! (how to determine it from the retry count and the handler outcome).

use super::message::RetryCount;
use super::outcome::{DeadLetterCause, HandlerOutcome};

/// Default retry budget per logical unit of work.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// The next action to take for a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing to forward; just acknowledge.
    Ack,

    /// Republish to the same topic with `next` as the retry count.
    Retry { next: RetryCount },

    /// Forward the original payload to the dead-letter topic.
    DeadLetter {
        cause: DeadLetterCause,
        reason: String,
    },
}

/// Trait for deciding the next action for a delivery.
///
/// Deciders are pure functions: given the retry count and the outcome,
/// they return the next action without side effects. Executing the decision
/// (publishing, acking) is the subscriber's job.
pub trait Decider: Send + Sync {
    fn decide(&self, retry_count: RetryCount, outcome: &HandlerOutcome) -> Decision;
}

/// Counted, backoff-free retry:
/// - success → ack
/// - panic → dead-letter immediately (never retried)
/// - error with `retry_count < max_retries` → retry with `retry_count + 1`
/// - error with `retry_count >= max_retries` → dead-letter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultDecider {
    max_retries: u32,
}

impl DefaultDecider {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl Default for DefaultDecider {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, retry_count: RetryCount, outcome: &HandlerOutcome) -> Decision {
        match outcome {
            HandlerOutcome::Success => Decision::Ack,
            HandlerOutcome::Panicked(reason) => Decision::DeadLetter {
                cause: DeadLetterCause::Panicked,
                reason: reason.clone(),
            },
            HandlerOutcome::Failed(reason) if retry_count.get() >= self.max_retries => {
                Decision::DeadLetter {
                    cause: DeadLetterCause::Exhausted,
                    reason: reason.clone(),
                }
            }
            HandlerOutcome::Failed(_) => Decision::Retry {
                next: retry_count.next(),
            },
        }
    }
}
