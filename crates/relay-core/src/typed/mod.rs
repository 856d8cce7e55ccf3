//! Typed - 型付き payload API
//!
//! subscriber は bytes ではなく `T` を handler に渡します。
//!
//! # 二層構造
//! - **表層（Typed）**: `Payload` trait, `Handler<T>` trait - 型安全
//! - **内部（Bytes）**: `JsonCodec` - transport 上の bytes と `T` の相互変換

pub mod codec;
pub mod handler;

use serde::Serialize;
use serde::de::DeserializeOwned;

// 主要な trait/型 を再エクスポート
pub use self::codec::{CodecError, JsonCodec};
pub use self::handler::{FnHandler, Handler, handler_fn};

/// Payload は subscriber / producer が扱える本文の型
///
/// # Trait Bounds
/// - `DeserializeOwned`: 受信した bytes からの復元のため
/// - `Serialize`: retry 時の再 publish のため
/// - `Send + Sync + 'static`: 並行に走る callback から使うため
///
/// 条件を満たす型には自動で実装されます。
pub trait Payload: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}
