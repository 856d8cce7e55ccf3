//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **Provisioner**: topic / subscription の冪等な用意
//! - **Producer**: payload の publish（retry / dead-letter 転送にも使用）
//! - **Subscriber**: 受信ループ（decode→handle→decide→forward→ack）
//! - **SubscriberBuilder**: 設定の検証とワイヤリング

pub mod builder;
pub mod config;
pub mod producer;
pub mod provisioner;
pub mod subscriber;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, SubscriberBuilder};
pub use self::config::{ConfigError, SubscriberConfig};
pub use self::producer::{Producer, ProducerError};
pub use self::provisioner::{ProvisionError, Provisioner};
pub use self::subscriber::{Subscriber, SubscriberError};
