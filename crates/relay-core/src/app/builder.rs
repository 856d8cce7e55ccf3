//! SubscriberBuilder - subscriber の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - build() 時に設定を検証し、不備があれば BuildError を返す
//! - 起動後（run）に設定ミスで落ちることがないようにする

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{Decider, DefaultDecider, SubscriptionId, TopicId};
use crate::impls::TracingEventSink;
use crate::ports::{EventSink, Transport};
use crate::typed::{Handler, Payload};

use super::config::{ConfigError, SubscriberConfig};
use super::subscriber::Subscriber;

/// BuildError は subscriber 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid subscriber config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// SubscriberBuilder は `Subscriber<T, H>` を構築
///
/// # 使用例
/// ```ignore
/// let subscriber = SubscriberBuilder::<Order, _>::new(transport, handler)
///     .topic("orders")
///     .subscription("orders-worker")
///     .max_retries(2)
///     .build()?;
/// ```
///
/// decider を指定しなければ `DefaultDecider::new(max_retries)`、
/// event sink を指定しなければ `TracingEventSink` を使います。
pub struct SubscriberBuilder<T: Payload, H: Handler<T>> {
    transport: Arc<dyn Transport>,
    handler: H,
    config: SubscriberConfig,
    decider: Option<Arc<dyn Decider>>,
    events: Arc<dyn EventSink>,
    _payload: PhantomData<fn() -> T>,
}

impl<T: Payload, H: Handler<T> + 'static> SubscriberBuilder<T, H> {
    pub fn new(transport: Arc<dyn Transport>, handler: H) -> Self {
        Self {
            transport,
            handler,
            config: SubscriberConfig::default(),
            decider: None,
            events: Arc::new(TracingEventSink),
            _payload: PhantomData,
        }
    }

    /// 設定をまとめて差し替える
    pub fn config(mut self, config: SubscriberConfig) -> Self {
        self.config = config;
        self
    }

    pub fn topic(mut self, topic: impl Into<TopicId>) -> Self {
        self.config.topic = topic.into();
        self
    }

    pub fn subscription(mut self, subscription: impl Into<SubscriptionId>) -> Self {
        self.config.subscription = subscription.into();
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn max_outstanding_messages(mut self, max: usize) -> Self {
        self.config.max_outstanding_messages = Some(max);
        self
    }

    /// 新規作成する subscription の ack deadline
    pub fn ack_deadline(mut self, ack_deadline: Duration) -> Self {
        self.config.ack_deadline = ack_deadline;
        self
    }

    /// 分類ロジックを差し替える（指定すると max_retries は使われない）
    pub fn decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = Some(decider);
        self
    }

    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// SubscriberBuilder を構築して Subscriber を生成
    ///
    /// # 検証
    /// - topic / subscription が空でないこと
    /// - ack deadline と max outstanding が 0 でないこと
    pub fn build(self) -> Result<Subscriber<T, H>, BuildError> {
        self.config.validate()?;

        let decider: Arc<dyn Decider> = match self.decider {
            Some(decider) => decider,
            None => Arc::new(DefaultDecider::new(self.config.max_retries)),
        };

        Ok(Subscriber::from_parts(
            self.config,
            self.handler,
            decider,
            self.transport,
            self.events,
        ))
    }
}
