//! Outcome model: what happened when the handler ran, and what we did about it.
//!
//! This module is transport-agnostic: it only defines the "shape" of results so
//! the decider and the event sink can reason about them.

use serde::{Deserialize, Serialize};

use super::message::RetryCount;

/// Result of one guarded handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Handler returned `Ok(())`.
    Success,

    /// Handler returned an error (may be retried).
    Failed(String),

    /// Handler panicked; the panic was contained at the boundary.
    Panicked(String),
}

/// Why a message ended up on the dead-letter topic.
///
/// Serialized as snake_case for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadLetterCause {
    /// Payload could not be decoded into the subscriber's type.
    Undecodable,

    /// Handler panicked.
    Panicked,

    /// Handler kept failing until the retry budget ran out.
    Exhausted,
}

/// Terminal result of processing one delivery.
///
/// The delivery is acknowledged in every case; this only records which path ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Handler succeeded.
    Acked,

    /// Republished to the same topic with the given retry count.
    Retried { retry_count: RetryCount },

    /// Forwarded to `<topic>_dlq`.
    DeadLettered { cause: DeadLetterCause },
}
