//! Transport resources (topics and subscriptions) as seen by the core.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ids::{SubscriptionId, TopicId};

/// Default ack deadline for new subscriptions.
pub const DEFAULT_ACK_DEADLINE: Duration = Duration::from_secs(10);

/// A named topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
}

impl Topic {
    pub fn new(id: TopicId) -> Self {
        Self { id }
    }
}

/// A subscription, bound to exactly one topic at creation time.
///
/// Neither the binding nor the ack deadline can change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub topic: TopicId,

    /// How long the transport waits for an ack before redelivering.
    pub ack_deadline: Duration,
}

impl Subscription {
    pub fn new(id: SubscriptionId, topic: TopicId, ack_deadline: Duration) -> Self {
        Self {
            id,
            topic,
            ack_deadline,
        }
    }
}
