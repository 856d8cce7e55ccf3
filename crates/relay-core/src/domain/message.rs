//! Message model: what the transport delivers and what we republish.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::MessageId;

/// Attribute key carrying the retry count (decimal string).
pub const RETRY_ATTRIBUTE: &str = "retries";

/// Attribute key carrying the failure description on dead-lettered messages.
pub const ERROR_ATTRIBUTE: &str = "error";

/// String key/value metadata attached to a message.
pub type Attributes = HashMap<String, String>;

/// A message as delivered by the transport.
///
/// Delivered messages are never mutated for redelivery: retries and dead-letters
/// are published as new messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,

    /// Opaque payload bytes (JSON for typed subscribers).
    pub data: Vec<u8>,

    #[serde(default)]
    pub attributes: Attributes,

    /// When the transport accepted the message.
    pub publish_time: DateTime<Utc>,
}

impl Message {
    pub fn new(
        id: MessageId,
        data: Vec<u8>,
        attributes: Attributes,
        publish_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            data,
            attributes,
            publish_time,
        }
    }

    /// Retry count carried by this delivery.
    pub fn retry_count(&self) -> RetryCount {
        RetryCount::from_attributes(&self.attributes)
    }

    /// Payload rendered for logs (lossy UTF-8).
    pub fn content_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Number of times a logical unit of work has already been retried.
///
/// Not stored anywhere except the `retries` attribute; derived on each delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetryCount(u32);

impl RetryCount {
    pub const ZERO: RetryCount = RetryCount(0);

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Reads `retries` from the attributes.
    ///
    /// Missing, unparsable or negative values count as 0 ("assume fresh").
    /// Counts beyond `u32::MAX` saturate, so they still exhaust the budget.
    pub fn from_attributes(attributes: &Attributes) -> Self {
        attributes
            .get(RETRY_ATTRIBUTE)
            .and_then(|raw| raw.parse::<i64>().ok())
            .map(|n| Self(u32::try_from(n.max(0)).unwrap_or(u32::MAX)))
            .unwrap_or_default()
    }

    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Copies `attributes` and stamps this count on the copy.
    pub fn stamp(self, attributes: &Attributes) -> Attributes {
        let mut stamped = attributes.clone();
        stamped.insert(RETRY_ATTRIBUTE.to_string(), self.0.to_string());
        stamped
    }
}

impl fmt::Display for RetryCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Attributes attached to a dead-lettered message: only the failure description.
pub fn dead_letter_attributes(error: impl Into<String>) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(ERROR_ATTRIBUTE.to_string(), error.into());
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[rstest]
    #[case::missing(&[], 0)]
    #[case::zero(&[("retries", "0")], 0)]
    #[case::three(&[("retries", "3")], 3)]
    #[case::padded(&[("retries", " 2 ")], 0)]
    #[case::plus_sign(&[("retries", "+2")], 2)]
    #[case::beyond_u32(&[("retries", "4294967296")], u32::MAX)]
    #[case::beyond_i64(&[("retries", "99999999999999999999")], 0)]
    #[case::garbage(&[("retries", "abc")], 0)]
    #[case::negative(&[("retries", "-1")], 0)]
    #[case::fraction(&[("retries", "1.5")], 0)]
    #[case::empty(&[("retries", "")], 0)]
    #[case::other_key(&[("attempts", "4")], 0)]
    fn retry_count_from_attributes(#[case] pairs: &[(&str, &str)], #[case] expected: u32) {
        let count = RetryCount::from_attributes(&attrs(pairs));
        assert_eq!(count.get(), expected);
    }

    #[test]
    fn stamp_keeps_other_attributes() {
        let original = attrs(&[("trace", "abc"), ("retries", "1")]);
        let stamped = RetryCount::new(1).next().stamp(&original);

        assert_eq!(stamped.get("retries").map(String::as_str), Some("2"));
        assert_eq!(stamped.get("trace").map(String::as_str), Some("abc"));
        // original is untouched
        assert_eq!(original.get("retries").map(String::as_str), Some("1"));
    }

    #[test]
    fn next_saturates() {
        assert_eq!(RetryCount::new(u32::MAX).next().get(), u32::MAX);
    }

    #[test]
    fn dead_letter_attributes_only_carry_error() {
        let attributes = dead_letter_attributes("boom");
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes.get(ERROR_ATTRIBUTE).map(String::as_str), Some("boom"));
    }

    #[test]
    fn message_exposes_retry_count() {
        let msg = Message::new(
            MessageId::new("m-1"),
            b"{}".to_vec(),
            attrs(&[("retries", "4")]),
            Utc::now(),
        );
        assert_eq!(msg.retry_count(), RetryCount::new(4));
        assert_eq!(msg.content_lossy(), "{}");
    }
}
