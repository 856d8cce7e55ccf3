//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! transport・時刻・ID 採番・イベント記録を trait として切り出し、
//! 実装の詳細（クラウドの pub/sub、in-memory、tracing など）を隠蔽します。

pub mod clock;
pub mod event_sink;
pub mod id_generator;
pub mod transport;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::EventSink;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::transport::{Delivery, ReceiveCallback, ReceiveSettings, Transport, TransportError};
