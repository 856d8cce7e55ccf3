//! Errors - エラー型と分類
//!
//! # 分類（FailureKind）
//! - Permanent: payload が decode できない（リトライ無意味、即 DLQ）
//! - Crash: handler が panic した（リトライしない、即 DLQ）
//! - Transient: handler がエラーを返した、まだ予算がある（再 publish）
//! - Exhausted: handler がエラーを返した、予算切れ（DLQ）
//! - Infrastructure: publish / provisioning / ack の失敗（ログのみ）

use std::fmt;

use serde::{Deserialize, Serialize};

use super::outcome::DeadLetterCause;

/// FailureKind は失敗の運用分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Permanent,
    Crash,
    Transient,
    Exhausted,
    Infrastructure,
}

impl From<DeadLetterCause> for FailureKind {
    fn from(cause: DeadLetterCause) -> Self {
        match cause {
            DeadLetterCause::Undecodable => FailureKind::Permanent,
            DeadLetterCause::Panicked => FailureKind::Crash,
            DeadLetterCause::Exhausted => FailureKind::Exhausted,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Permanent => "permanent",
            FailureKind::Crash => "crash",
            FailureKind::Transient => "transient",
            FailureKind::Exhausted => "exhausted",
            FailureKind::Infrastructure => "infrastructure",
        };
        f.write_str(s)
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// HandlerError は handler が返すエラー
///
/// handler 側の業務エラーをそのまま包むだけで、リトライ可否は判断しない
/// （判断は Decider が retry count から行う）。
#[derive(Debug)]
pub struct HandlerError {
    message: String,
    source: Option<BoxError>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// 下位のエラーを source として保持する
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message, source),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn display_includes_source() {
        let io = std::io::Error::other("disk full");
        let err = HandlerError::with_source("could not persist order", io);
        assert_eq!(err.to_string(), "could not persist order: disk full");
        assert!(err.source().is_some());
    }

    #[test]
    fn plain_message() {
        let err: HandlerError = "nope".into();
        assert_eq!(err.to_string(), "nope");
        assert_eq!(err.message(), "nope");
        assert!(err.source().is_none());
    }

    #[test]
    fn dead_letter_causes_map_to_failure_kinds() {
        assert_eq!(FailureKind::from(DeadLetterCause::Undecodable), FailureKind::Permanent);
        assert_eq!(FailureKind::from(DeadLetterCause::Panicked), FailureKind::Crash);
        assert_eq!(FailureKind::from(DeadLetterCause::Exhausted), FailureKind::Exhausted);
    }
}
