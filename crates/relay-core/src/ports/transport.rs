//! Transport port - 外部の pub/sub transport
//!
//! core は transport を再実装しません。ここではこの crate が前提とする契約だけを定義します。
//!
//! # 契約
//! - topic / subscription の存在確認と作成
//! - publish（attributes はそのまま付与）
//! - receive: 配送ごとに callback を呼ぶ（at-least-once、同時実行数は上限付き）
//! - 配送は `Delivery::ack()` で明示的に確定する
//!
//! # Thread Safety
//! - `Transport` は `Send + Sync`（全配送から読み取り専用で共有される）

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::domain::{Attributes, Message, MessageId, Subscription, SubscriptionId, Topic, TopicId};

/// TransportError は transport 操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("transport closed")]
    Closed,
}

impl TransportError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, TransportError::AlreadyExists { .. })
    }
}

/// Receive-side flow control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveSettings {
    /// Upper bound on deliveries handed out but not yet acked.
    /// `None` means the transport's own default.
    pub max_outstanding_messages: Option<usize>,
}

/// A single delivery of a message.
///
/// The receiver owns this delivery and must `ack` it; an unacked delivery is
/// redelivered by the transport once the ack deadline passes.
#[async_trait]
pub trait Delivery: Send {
    fn message(&self) -> &Message;

    /// Acknowledge this delivery.
    async fn ack(self: Box<Self>) -> Result<(), TransportError>;
}

/// Callback invoked once per delivery, possibly concurrently.
#[async_trait]
pub trait ReceiveCallback: Send + Sync {
    async fn on_delivery(&self, delivery: Box<dyn Delivery>);
}

/// Transport は topic/subscription 管理・publish・receive を提供
#[async_trait]
pub trait Transport: Send + Sync {
    /// Topic を取得（存在しなければ None）
    async fn topic(&self, id: &TopicId) -> Result<Option<Topic>, TransportError>;

    async fn create_topic(&self, id: &TopicId) -> Result<Topic, TransportError>;

    /// Subscription を取得（存在しなければ None）
    async fn subscription(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, TransportError>;

    /// 作成後は topic との紐付けも ack deadline も変更できない
    async fn create_subscription(
        &self,
        id: &SubscriptionId,
        topic: &Topic,
        ack_deadline: Duration,
    ) -> Result<Subscription, TransportError>;

    /// Publish bytes with attributes attached verbatim. Returns the assigned id.
    async fn publish(
        &self,
        topic: &TopicId,
        data: Vec<u8>,
        attributes: Attributes,
    ) -> Result<MessageId, TransportError>;

    /// Deliver messages to `callback` until `shutdown` becomes `true` or a
    /// fatal error occurs.
    ///
    /// Cancellation only stops new deliveries; callbacks already running are
    /// allowed to finish.
    async fn receive(
        &self,
        subscription: &SubscriptionId,
        settings: ReceiveSettings,
        shutdown: watch::Receiver<bool>,
        callback: Arc<dyn ReceiveCallback>,
    ) -> Result<(), TransportError>;

    async fn topic_exists(&self, id: &TopicId) -> Result<bool, TransportError> {
        Ok(self.topic(id).await?.is_some())
    }
}
