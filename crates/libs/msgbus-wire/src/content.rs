//! Pluggable content (de)serialization. The frame header's
//! `serializer_id` field names which backend produced `content`; `0` means
//! "opaque bytes, no codec".

use serde::{de::DeserializeOwned, Serialize};

use crate::WireError;

/// A pluggable content codec, identified on the wire by `serializer_id`.
pub trait ContentCodec {
    /// The `serializer_id` this codec claims in the message header.
    fn serializer_id(&self) -> u64;
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, WireError>;
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, WireError>;
}

/// MessagePack backend (`rmp-serde`), matching `src/message/payload.rs`'s
/// use of `rmp_serde::to_vec`/`from_slice` for message content.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl MsgPackCodec {
    pub const SERIALIZER_ID: u64 = 1;
}

impl ContentCodec for MsgPackCodec {
    fn serializer_id(&self) -> u64 {
        Self::SERIALIZER_ID
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, WireError> {
        rmp_serde::to_vec(value).map_err(|e| WireError::Content(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, WireError> {
        rmp_serde::from_slice(bytes).map_err(|e| WireError::Content(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ping {
        nonce: u64,
    }

    #[test]
    fn msgpack_roundtrip() {
        let codec = MsgPackCodec;
        let value = Ping { nonce: 7 };
        let bytes = codec.encode(&value).unwrap();
        let decoded: Ping = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, value);
    }
}
