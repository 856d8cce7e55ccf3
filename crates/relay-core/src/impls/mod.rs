//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryTransport**: 開発・テスト用の transport（at-least-once、ack deadline 付き）
//! - **TracingEventSink**: `tracing` へのイベント出力（デフォルト）
//! - **MemoryEventSink**: テスト用にイベントを記録
//!
//! # 本番用実装
//! クラウドの pub/sub クライアントは `Transport` を実装した別クレートに配置します。

pub mod inmem_transport;
pub mod memory_sink;
pub mod tracing_sink;

// 主要な型を再エクスポート
pub use self::inmem_transport::{
    DEFAULT_HISTORY_LIMIT, DEFAULT_MAX_OUTSTANDING_MESSAGES, InMemoryTransport,
};
pub use self::memory_sink::MemoryEventSink;
pub use self::tracing_sink::TracingEventSink;
