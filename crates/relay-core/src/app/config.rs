//! SubscriberConfig - subscriber の設定
//!
//! # デフォルト
//! - max_retries: 5
//! - max_outstanding_messages: None（transport のデフォルト）
//! - ack_deadline: 10 秒（新規作成する subscription にのみ適用）
//!
//! topic と subscription には既定値がないので、`validate()` で必須チェックします。

use std::time::Duration;

use thiserror::Error;

use crate::domain::{DEFAULT_ACK_DEADLINE, DEFAULT_MAX_RETRIES, SubscriptionId, TopicId};

/// ConfigError は設定値の不備
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("topic is required")]
    MissingTopic,

    #[error("subscription is required")]
    MissingSubscription,

    #[error("ack deadline must be greater than zero")]
    ZeroAckDeadline,

    #[error("max outstanding messages must be greater than zero")]
    ZeroMaxOutstanding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberConfig {
    pub topic: TopicId,
    pub subscription: SubscriptionId,
    pub max_retries: u32,
    pub max_outstanding_messages: Option<usize>,
    pub ack_deadline: Duration,
}

impl SubscriberConfig {
    pub fn new(topic: impl Into<TopicId>, subscription: impl Into<SubscriptionId>) -> Self {
        Self {
            topic: topic.into(),
            subscription: subscription.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topic.is_empty() {
            return Err(ConfigError::MissingTopic);
        }
        if self.subscription.is_empty() {
            return Err(ConfigError::MissingSubscription);
        }
        if self.ack_deadline.is_zero() {
            return Err(ConfigError::ZeroAckDeadline);
        }
        if self.max_outstanding_messages == Some(0) {
            return Err(ConfigError::ZeroMaxOutstanding);
        }
        Ok(())
    }
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            topic: TopicId::new(""),
            subscription: SubscriptionId::new(""),
            max_retries: DEFAULT_MAX_RETRIES,
            max_outstanding_messages: None,
            ack_deadline: DEFAULT_ACK_DEADLINE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults() {
        let config = SubscriberConfig::new("orders", "orders-worker");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.max_outstanding_messages, None);
        assert_eq!(config.ack_deadline, Duration::from_secs(10));
        assert_eq!(config.validate(), Ok(()));
    }

    #[rstest]
    #[case::no_topic(SubscriberConfig::new("", "w"), ConfigError::MissingTopic)]
    #[case::no_subscription(SubscriberConfig::new("orders", ""), ConfigError::MissingSubscription)]
    #[case::zero_deadline(
        SubscriberConfig { ack_deadline: Duration::ZERO, ..SubscriberConfig::new("orders", "w") },
        ConfigError::ZeroAckDeadline
    )]
    #[case::zero_outstanding(
        SubscriberConfig { max_outstanding_messages: Some(0), ..SubscriberConfig::new("orders", "w") },
        ConfigError::ZeroMaxOutstanding
    )]
    fn invalid(#[case] config: SubscriberConfig, #[case] expected: ConfigError) {
        assert_eq!(config.validate(), Err(expected));
    }
}
