//! Domain model (names, messages, outcomes, decisions, events, errors).

pub mod decision;
pub mod errors;
pub mod events;
pub mod ids;
pub mod message;
pub mod outcome;
pub mod resources;

pub use self::decision::{DEFAULT_MAX_RETRIES, Decider, Decision, DefaultDecider};
pub use self::errors::{FailureKind, HandlerError};
pub use self::events::SubscriberEvent;
pub use self::ids::{DEAD_LETTER_SUFFIX, MessageId, Name, NameMarker, SubscriptionId, TopicId};
pub use self::message::{
    Attributes, ERROR_ATTRIBUTE, Message, RETRY_ATTRIBUTE, RetryCount, dead_letter_attributes,
};
pub use self::outcome::{DeadLetterCause, Disposition, HandlerOutcome};
pub use self::resources::{DEFAULT_ACK_DEADLINE, Subscription, Topic};
