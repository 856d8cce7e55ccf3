//! Producer - 型付き payload の publish
//!
//! subscriber の retry / dead-letter 転送にも使われます。リトライ・バックオフはしません。

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::domain::{Attributes, MessageId, TopicId};
use crate::ports::{Transport, TransportError};
use crate::typed::{CodecError, JsonCodec};

/// ProducerError は publish 時のエラー
#[derive(Debug, Error)]
pub enum ProducerError {
    /// encode に失敗したので何も送っていない
    #[error("encoding payload for '{topic}': {source}")]
    Encode {
        topic: TopicId,
        #[source]
        source: CodecError,
    },

    #[error("publishing to '{topic}': {source}")]
    Transport {
        topic: TopicId,
        #[source]
        source: TransportError,
    },
}

/// Producer は transport への publish を行う
#[derive(Clone)]
pub struct Producer {
    transport: Arc<dyn Transport>,
}

impl Producer {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// payload を JSON にして publish（attributes はそのまま付与）
    pub async fn publish<T: Serialize + ?Sized>(
        &self,
        topic: &TopicId,
        payload: &T,
        attributes: Attributes,
    ) -> Result<MessageId, ProducerError> {
        let data = JsonCodec::encode(payload).map_err(|source| ProducerError::Encode {
            topic: topic.clone(),
            source,
        })?;
        self.publish_bytes(topic, data, attributes).await
    }

    /// encode 済みの bytes をそのまま publish
    pub async fn publish_bytes(
        &self,
        topic: &TopicId,
        data: Vec<u8>,
        attributes: Attributes,
    ) -> Result<MessageId, ProducerError> {
        self.transport
            .publish(topic, data, attributes)
            .await
            .map_err(|source| ProducerError::Transport {
                topic: topic.clone(),
                source,
            })
    }
}
