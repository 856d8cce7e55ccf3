//! TracingEventSink - SubscriberEvent を `tracing` の構造化ログに変換する

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::domain::SubscriberEvent;
use crate::ports::EventSink;

/// `tracing` に流す EventSink（デフォルト）
///
/// subscriber 側は `tracing_subscriber` などの初期化を知らなくてよい。
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: SubscriberEvent) {
        match event {
            SubscriberEvent::TopicCreated { topic } => {
                info!(%topic, "created topic");
            }
            SubscriberEvent::SubscriptionCreated {
                subscription,
                topic,
                ack_deadline,
            } => {
                info!(
                    %subscription,
                    %topic,
                    ack_deadline_ms = millis(ack_deadline),
                    "created subscription"
                );
            }
            SubscriberEvent::SubscriptionTopicMismatch {
                subscription,
                expected,
                actual,
            } => {
                warn!(
                    %subscription,
                    %expected,
                    %actual,
                    "subscription is bound to another topic; keeping existing binding"
                );
            }
            SubscriberEvent::StartFailed {
                subscription,
                error,
            } => {
                error!(%subscription, %error, "error starting subscriber");
            }
            SubscriberEvent::Started {
                subscription,
                topic,
            } => {
                info!(%subscription, %topic, "starting consumer");
            }
            SubscriberEvent::Stopped { subscription } => {
                info!(%subscription, "consumer stopped");
            }
            SubscriberEvent::Processing {
                message_id,
                retry_count,
            } => {
                debug!(%message_id, %retry_count, "processing message");
            }
            SubscriberEvent::DecodeFailed {
                message_id,
                content,
                error,
            } => {
                error!(%message_id, %content, %error, "cannot decode message, sending to dlq");
            }
            SubscriberEvent::HandlerPanicked {
                message_id,
                content,
                panic,
            } => {
                warn!(%message_id, %content, %panic, "handler panicked, sending to dlq");
            }
            SubscriberEvent::HandlerFailed {
                message_id,
                retry_count,
                error,
            } => {
                error!(%message_id, %retry_count, %error, "error processing message");
            }
            SubscriberEvent::Retrying {
                message_id,
                topic,
                retry_count,
            } => {
                info!(%message_id, %topic, %retry_count, "requeueing message");
            }
            SubscriberEvent::DeadLettering {
                message_id,
                topic,
                cause,
            } => {
                info!(%message_id, %topic, ?cause, "sending message to dlq");
            }
            SubscriberEvent::ForwardFailed {
                message_id,
                target,
                kind,
                original,
                error,
            } => {
                error!(
                    %message_id,
                    %target,
                    %kind,
                    %original,
                    %error,
                    "forwarding failed; message acked anyway and dropped from the pipeline"
                );
            }
            SubscriberEvent::Acked {
                message_id,
                elapsed,
            } => {
                debug!(
                    %message_id,
                    elapsed_ms = millis(elapsed),
                    "sending ack"
                );
            }
            SubscriberEvent::AckFailed { message_id, error } => {
                warn!(%message_id, %error, "ack failed; transport will redeliver");
            }
            SubscriberEvent::AckDeadlineExceeded {
                message_id,
                elapsed,
                ack_deadline,
            } => {
                warn!(
                    %message_id,
                    elapsed_ms = millis(elapsed),
                    ack_deadline_ms = millis(ack_deadline),
                    "processing exceeded ack deadline; transport may redeliver"
                );
            }
        }
    }
}

/// ログ用のミリ秒（`u64` に収まらなければ飽和）
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
