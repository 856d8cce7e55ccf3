//! Subscriber - 受信ループと配送ごとのパイプライン
//!
//! # フロー（配送ごと）
//! 1. `JsonCodec` で `T` に decode（失敗 → dead-letter、handler は呼ばない）
//! 2. panic を閉じ込めた状態で handler を実行
//! 3. `Decider` で次の行動を決める（ack / retry / dead-letter）
//! 4. retry なら同じ topic に `retries + 1` で再 publish、dead-letter なら `<topic>_dlq` へ転送
//! 5. どの経路でも最後に ack
//!
//! # 設計原則
//! - 転送の失敗は `ForwardFailed` を出すだけで、配送は ack する（その作業単位は失われる）
//! - パイプラインは `Arc` で共有し、ロックを持たない
//! - ログは `EventSink` 経由でのみ出す

use std::any::Any;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::domain::{
    DeadLetterCause, Decider, Decision, Disposition, FailureKind, HandlerOutcome, Message,
    RetryCount, SubscriberEvent, TopicId, dead_letter_attributes,
};
use crate::ports::{Delivery, EventSink, ReceiveCallback, ReceiveSettings, Transport, TransportError};
use crate::typed::{Handler, JsonCodec, Payload};

use super::config::SubscriberConfig;
use super::producer::Producer;
use super::provisioner::{ProvisionError, Provisioner};

/// SubscriberError は `run` から返るエラー
///
/// 配送ごとの失敗はここには来ません（イベントとして記録されます）。
#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("provisioning subscription: {0}")]
    Provision(#[from] ProvisionError),

    #[error("receiving: {0}")]
    Receive(#[source] TransportError),
}

/// Subscriber は 1 つの subscription を購読し、`T` を handler に渡す
///
/// 構築は `SubscriberBuilder` で行います。
pub struct Subscriber<T: Payload, H: Handler<T>> {
    pipeline: Arc<Pipeline<T, H>>,
}

/// 配送ごとに共有される不変の部品
struct Pipeline<T, H> {
    config: SubscriberConfig,
    handler: H,
    decider: Arc<dyn Decider>,
    transport: Arc<dyn Transport>,
    producer: Producer,
    provisioner: Provisioner,
    events: Arc<dyn EventSink>,
    _payload: PhantomData<fn() -> T>,
}

impl<T: Payload, H: Handler<T> + 'static> Subscriber<T, H> {
    pub(crate) fn from_parts(
        config: SubscriberConfig,
        handler: H,
        decider: Arc<dyn Decider>,
        transport: Arc<dyn Transport>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let pipeline = Pipeline {
            producer: Producer::new(Arc::clone(&transport)),
            provisioner: Provisioner::new(Arc::clone(&transport), Arc::clone(&events)),
            config,
            handler,
            decider,
            transport,
            events,
            _payload: PhantomData,
        };
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn config(&self) -> &SubscriberConfig {
        &self.pipeline.config
    }

    /// 受信ループを実行する
    ///
    /// `shutdown` が `true` になるか、transport が致命的なエラーを返すまで戻りません。
    /// shutdown 後は新しい配送を受け取らず、実行中の handler は中断しません。
    ///
    /// # エラー
    /// - subscription の用意に失敗した場合（起動しない）
    /// - transport の receive が失敗した場合
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<(), SubscriberError> {
        let pipeline = &self.pipeline;
        let config = &pipeline.config;

        let subscription = match pipeline
            .provisioner
            .ensure_subscription(&config.subscription, &config.topic, config.ack_deadline)
            .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                pipeline.events.emit(SubscriberEvent::StartFailed {
                    subscription: config.subscription.clone(),
                    error: e.to_string(),
                });
                return Err(SubscriberError::Provision(e));
            }
        };

        pipeline.events.emit(SubscriberEvent::Started {
            subscription: subscription.id.clone(),
            topic: subscription.topic.clone(),
        });

        let callback = Arc::new(Dispatch {
            pipeline: Arc::clone(pipeline),
            ack_deadline: subscription.ack_deadline,
        });
        let settings = ReceiveSettings {
            max_outstanding_messages: config.max_outstanding_messages,
        };

        let result = pipeline
            .transport
            .receive(&subscription.id, settings, shutdown, callback)
            .await;

        pipeline.events.emit(SubscriberEvent::Stopped {
            subscription: subscription.id.clone(),
        });
        result.map_err(SubscriberError::Receive)
    }

    /// 1 件の配送を最後（ack）まで処理する
    ///
    /// ack deadline の判定には設定値の `ack_deadline` を使います。
    pub async fn process(&self, delivery: Box<dyn Delivery>) -> Disposition {
        self.pipeline
            .process(delivery, self.pipeline.config.ack_deadline)
            .await
    }
}

/// transport から呼ばれる callback
struct Dispatch<T, H> {
    pipeline: Arc<Pipeline<T, H>>,

    /// 実際の subscription の ack deadline（既存 subscription は設定値と異なりうる）
    ack_deadline: Duration,
}

#[async_trait]
impl<T: Payload, H: Handler<T> + 'static> ReceiveCallback for Dispatch<T, H> {
    async fn on_delivery(&self, delivery: Box<dyn Delivery>) {
        self.pipeline.process(delivery, self.ack_deadline).await;
    }
}

impl<T: Payload, H: Handler<T>> Pipeline<T, H> {
    async fn process(&self, delivery: Box<dyn Delivery>, ack_deadline: Duration) -> Disposition {
        let started = Instant::now();
        let message = delivery.message().clone();

        let disposition = self.dispose(&message).await;

        let elapsed = started.elapsed();
        if elapsed > ack_deadline {
            self.events.emit(SubscriberEvent::AckDeadlineExceeded {
                message_id: message.id.clone(),
                elapsed,
                ack_deadline,
            });
        }

        match delivery.ack().await {
            Ok(()) => self.events.emit(SubscriberEvent::Acked {
                message_id: message.id,
                elapsed,
            }),
            Err(e) => self.events.emit(SubscriberEvent::AckFailed {
                message_id: message.id,
                error: e.to_string(),
            }),
        }

        disposition
    }

    /// decode → handler → decide → 転送（ack 以外のすべて）
    async fn dispose(&self, message: &Message) -> Disposition {
        let retry_count = message.retry_count();

        let body: T = match JsonCodec::decode(&message.data) {
            Ok(body) => body,
            Err(e) => {
                let error = e.to_string();
                self.events.emit(SubscriberEvent::DecodeFailed {
                    message_id: message.id.clone(),
                    content: message.content_lossy(),
                    error: error.clone(),
                });
                let cause = DeadLetterCause::Undecodable;
                self.dead_letter(message, cause, error).await;
                return Disposition::DeadLettered { cause };
            }
        };

        self.events.emit(SubscriberEvent::Processing {
            message_id: message.id.clone(),
            retry_count,
        });

        let outcome = self.invoke(&body).await;
        match &outcome {
            HandlerOutcome::Success => {}
            HandlerOutcome::Failed(error) => {
                self.events.emit(SubscriberEvent::HandlerFailed {
                    message_id: message.id.clone(),
                    retry_count,
                    error: error.clone(),
                });
            }
            HandlerOutcome::Panicked(panic) => {
                self.events.emit(SubscriberEvent::HandlerPanicked {
                    message_id: message.id.clone(),
                    content: message.content_lossy(),
                    panic: panic.clone(),
                });
            }
        }

        match self.decider.decide(retry_count, &outcome) {
            Decision::Ack => Disposition::Acked,
            Decision::Retry { next } => {
                self.retry(message, &body, next).await;
                Disposition::Retried { retry_count: next }
            }
            Decision::DeadLetter { cause, reason } => {
                self.dead_letter(message, cause, reason).await;
                Disposition::DeadLettered { cause }
            }
        }
    }

    /// handler を panic 境界の内側で実行する
    async fn invoke(&self, body: &T) -> HandlerOutcome {
        let guarded = AssertUnwindSafe(async { self.handler.handle(body).await })
            .catch_unwind()
            .await;

        match guarded {
            Ok(Ok(())) => HandlerOutcome::Success,
            Ok(Err(e)) => HandlerOutcome::Failed(e.to_string()),
            Err(payload) => HandlerOutcome::Panicked(panic_message(payload.as_ref())),
        }
    }

    /// 同じ topic に retry count を上げて再 publish（body は再 encode）
    async fn retry(&self, message: &Message, body: &T, next: RetryCount) {
        let topic = &self.config.topic;
        self.events.emit(SubscriberEvent::Retrying {
            message_id: message.id.clone(),
            topic: topic.clone(),
            retry_count: next,
        });

        let attributes = next.stamp(&message.attributes);
        if let Err(e) = self.producer.publish(topic, body, attributes).await {
            self.forward_failed(message, topic, FailureKind::Transient, e.to_string());
        }
    }

    /// 元の bytes を `<topic>_dlq` に転送（attributes は `error` のみ）
    async fn dead_letter(&self, message: &Message, cause: DeadLetterCause, reason: String) {
        let target = self.config.topic.dead_letter();
        self.events.emit(SubscriberEvent::DeadLettering {
            message_id: message.id.clone(),
            topic: target.clone(),
            cause,
        });

        if let Err(e) = self.provisioner.ensure_topic(&target).await {
            self.forward_failed(message, &target, cause.into(), e.to_string());
            return;
        }

        let attributes = dead_letter_attributes(reason);
        if let Err(e) = self
            .producer
            .publish_bytes(&target, message.data.clone(), attributes)
            .await
        {
            self.forward_failed(message, &target, cause.into(), e.to_string());
        }
    }

    /// 転送の失敗は元の分類に関わらず `Infrastructure`
    fn forward_failed(
        &self,
        message: &Message,
        target: &TopicId,
        original: FailureKind,
        error: String,
    ) {
        self.events.emit(SubscriberEvent::ForwardFailed {
            message_id: message.id.clone(),
            target: target.clone(),
            kind: FailureKind::Infrastructure,
            original,
            error,
        });
    }
}

/// panic payload を文字列にする（`&str` か `String` 以外は不明扱い）
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
