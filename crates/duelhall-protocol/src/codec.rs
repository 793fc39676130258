//! Codec trait and implementations for serializing/deserializing frames.
//!
//! The gateway doesn't care HOW frames are serialized, only that something
//! implements [`Codec`]. [`JsonCodec`] is the only implementation today;
//! browsers speak JSON over WebSocket text frames.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes Rust types to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task on the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use duelhall_protocol::{Action, ClientFrame, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let frame = ClientFrame { id: 7, action: Action::Ping };
///
/// let bytes = codec.encode(&frame).unwrap();
/// let decoded: ClientFrame = codec.decode(&bytes).unwrap();
/// assert_eq!(frame, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Action, ClientFrame, GameVariant, SessionId};

    #[test]
    fn test_decode_create_request_frame() {
        let raw = br#"{"id":3,"action":{"type":"CreateRequest","session_id":12,"variant":"reflex"}}"#;
        let frame: ClientFrame = JsonCodec.decode(raw).unwrap();
        assert_eq!(frame.id, 3);
        assert_eq!(
            frame.action,
            Action::CreateRequest {
                session_id: SessionId(12),
                variant: GameVariant::Reflex,
            }
        );
    }

    #[test]
    fn test_decode_unknown_variant_returns_decode_error() {
        let raw = br#"{"id":1,"action":{"type":"CreateRequest","session_id":1,"variant":"chess"}}"#;
        let result: Result<ClientFrame, _> = JsonCodec.decode(raw);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_garbage_returns_error() {
        let result: Result<ClientFrame, _> = JsonCodec.decode(b"not json at all");
        assert!(result.is_err());
    }
}
