//! relay-core
//!
//! Retry-then-dead-letter subscriber built on top of an external pub/sub transport.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, message, outcome, decision, events, errors, resources）
//! - **ports**: 抽象化レイヤー（Transport, Clock, IdGenerator, EventSink）
//! - **app**: アプリケーションロジック（provisioner, producer, subscriber, builder）
//! - **typed**: 型付き payload API（Payload, Handler trait, JsonCodec）
//! - **impls**: 実装（InMemoryTransport, TracingEventSink, MemoryEventSink）
//!
//! # ポリシー
//! - handler がエラーを返したら、`retries` attribute を +1 して同じ topic に再 publish
//! - `retries` が上限に達していたら `<topic>_dlq` へ転送
//! - decode できない payload と panic した handler は即 `<topic>_dlq`
//! - 受け取った配送はどの経路でも ack する

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;

pub use crate::app::{
    BuildError, Producer, ProducerError, ProvisionError, Provisioner, Subscriber,
    SubscriberBuilder, SubscriberConfig, SubscriberError,
};
pub use crate::domain::{HandlerError, Message, SubscriptionId, TopicId};
pub use crate::typed::{Handler, handler_fn};
