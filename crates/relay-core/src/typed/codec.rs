//! JsonCodec - transport 上の bytes と型付き payload の相互変換

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// CodecError は payload の変換失敗
#[derive(Debug, Error)]
pub enum CodecError {
    /// bytes を `T` にできない（リトライしても直らない）
    #[error("cannot decode payload as {type_name}: {source}")]
    Decode {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot encode payload: {0}")]
    Encode(#[source] serde_json::Error),
}

/// JSON codec（transport 上の形式は常に JSON）
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(data).map_err(|source| CodecError::Decode {
            type_name: std::any::type_name::<T>(),
            source,
        })
    }

    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(CodecError::Encode)
    }
}
