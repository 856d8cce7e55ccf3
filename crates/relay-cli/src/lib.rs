//! relay-cli
//!
//! demo バイナリ用の設定読み込みとログ初期化。

pub mod logging;
pub mod settings;
