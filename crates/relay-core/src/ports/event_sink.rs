//! EventSink port - イベント記録の抽象化
//!
//! # 実装
//! - **TracingEventSink**: `tracing` に流す（デフォルト）
//! - **MemoryEventSink**: 記録するだけ（テスト用）

use crate::domain::SubscriberEvent;

/// EventSink は subscriber のドメインイベントを記録
///
/// パイプラインの途中から呼ばれるので、ブロックしない実装にしてください。
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SubscriberEvent);
}
