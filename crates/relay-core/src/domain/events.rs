//! Events - subscriber が発生させるドメインイベント
//!
//! パイプラインはグローバルなロガーを直接呼ばず、このイベントを
//! `EventSink` に渡すだけにしています。ログへの変換は sink 側の責務です。

use std::time::Duration;

use super::errors::FailureKind;
use super::ids::{MessageId, SubscriptionId, TopicId};
use super::message::RetryCount;
use super::outcome::DeadLetterCause;

/// SubscriberEvent はパイプラインで発生したイベント
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriberEvent {
    /// A topic did not exist and was created.
    TopicCreated { topic: TopicId },

    /// A subscription did not exist and was created.
    SubscriptionCreated {
        subscription: SubscriptionId,
        topic: TopicId,
        ack_deadline: Duration,
    },

    /// An existing subscription is bound to a different topic than configured.
    SubscriptionTopicMismatch {
        subscription: SubscriptionId,
        expected: TopicId,
        actual: TopicId,
    },

    /// Provisioning failed; the subscriber will not start.
    StartFailed {
        subscription: SubscriptionId,
        error: String,
    },

    /// Receive loop is starting.
    Started {
        subscription: SubscriptionId,
        topic: TopicId,
    },

    /// Receive loop returned.
    Stopped { subscription: SubscriptionId },

    /// Handler is about to run.
    Processing {
        message_id: MessageId,
        retry_count: RetryCount,
    },

    /// Payload could not be decoded into the subscriber's type.
    DecodeFailed {
        message_id: MessageId,
        content: String,
        error: String,
    },

    /// Handler panicked; the panic was contained.
    HandlerPanicked {
        message_id: MessageId,
        content: String,
        panic: String,
    },

    /// Handler returned an error.
    HandlerFailed {
        message_id: MessageId,
        retry_count: RetryCount,
        error: String,
    },

    /// Republishing to the same topic with a higher retry count.
    Retrying {
        message_id: MessageId,
        topic: TopicId,
        retry_count: RetryCount,
    },

    /// Forwarding to the dead-letter topic.
    DeadLettering {
        message_id: MessageId,
        topic: TopicId,
        cause: DeadLetterCause,
    },

    /// Retry or dead-letter publish failed. The delivery is still acked,
    /// so the logical unit of work is lost from the pipeline.
    ///
    /// `kind` is always `Infrastructure`; `original` is how the message
    /// itself was classified before forwarding failed.
    ForwardFailed {
        message_id: MessageId,
        target: TopicId,
        kind: FailureKind,
        original: FailureKind,
        error: String,
    },

    /// Delivery acknowledged.
    Acked {
        message_id: MessageId,
        elapsed: Duration,
    },

    /// Acknowledgement failed (transport will redeliver).
    AckFailed { message_id: MessageId, error: String },

    /// Processing took longer than the subscription's ack deadline, so the
    /// transport may already have redelivered this message.
    AckDeadlineExceeded {
        message_id: MessageId,
        elapsed: Duration,
        ack_deadline: Duration,
    },
}
