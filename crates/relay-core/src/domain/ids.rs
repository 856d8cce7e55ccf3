//! Domain identifiers (strongly-typed names).
//!
//! # Phantom Type パターン
//! Topic / Subscription / Message はすべて文字列で識別されますが、
//! `Name<T>` というジェネリック型で共通実装を提供しつつ、
//! `T` をマーカー型（PhantomData）にすることで取り違えをコンパイル時に防ぎます。
//!
//! - `TopicId` と `SubscriptionId` は混同できない
//! - `MessageId` は transport が採番する（不変）

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::marker::PhantomData;

/// Dead-letter topic のサフィックス。既存デプロイとの互換のため固定。
pub const DEAD_LETTER_SUFFIX: &str = "_dlq";

/// NameMarker は各 Name 型のマーカー trait
pub trait NameMarker: Send + Sync + 'static {
    /// ログなどで使う種別名（例: "topic"）
    fn kind() -> &'static str;
}

/// ジェネリックな名前型
///
/// # 例
/// ```ignore
/// let topic = TopicId::new("orders");
/// let sub = SubscriptionId::new("orders-worker");
/// // topic と sub は異なる型なので、混同できない
/// ```
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name<T: NameMarker> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: NameMarker> Name<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

// derive だと T にも bound が付いてしまうので手で実装する
impl<T: NameMarker> Clone for Name<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T: NameMarker> PartialEq for Name<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: NameMarker> Eq for Name<T> {}

impl<T: NameMarker> std::hash::Hash for Name<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T: NameMarker> PartialOrd for Name<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: NameMarker> Ord for Name<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T: NameMarker> fmt::Debug for Name<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", T::kind(), self.value)
    }
}

impl<T: NameMarker> fmt::Display for Name<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl<T: NameMarker> From<&str> for Name<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<T: NameMarker> From<String> for Name<T> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<T: NameMarker> Borrow<str> for Name<T> {
    fn borrow(&self) -> &str {
        &self.value
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Topic のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TopicKind {}

impl NameMarker for TopicKind {
    fn kind() -> &'static str {
        "topic"
    }
}

/// Subscription のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubscriptionKind {}

impl NameMarker for SubscriptionKind {
    fn kind() -> &'static str {
        "subscription"
    }
}

/// Message のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {}

impl NameMarker for MessageKind {
    fn kind() -> &'static str {
        "message"
    }
}

// ========================================
// Type Alias（使いやすさのため）
// ========================================

/// Identifier of a topic.
pub type TopicId = Name<TopicKind>;

/// Identifier of a subscription (bound 1:1 to a topic at creation).
pub type SubscriptionId = Name<SubscriptionKind>;

/// Transport-assigned identifier of a single published message.
pub type MessageId = Name<MessageKind>;

impl TopicId {
    /// `<topic>_dlq` を返す
    pub fn dead_letter(&self) -> TopicId {
        TopicId::new(format!("{}{}", self.value, DEAD_LETTER_SUFFIX))
    }
}
