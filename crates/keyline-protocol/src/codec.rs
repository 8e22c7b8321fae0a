//! Codec trait and implementations for serializing/deserializing frames.
//!
//! The protocol layer does not care how messages become bytes; anything
//! implementing [`Codec`] will do. [`JsonCodec`] (the default, behind the
//! `json` feature) keeps frames human-readable, which pays for itself every
//! time a misbehaving station needs its traffic read straight off a packet
//! capture. A compact binary codec can slot in later without touching any
//! other layer.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts protocol values to bytes and back.
///
/// `Send + Sync + 'static` because a codec is shared by every connection
/// task on the relay. The methods are generic over the value type so the
/// same codec handles envelopes, control messages, and anything else that
/// derives the serde traits.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] for malformed, truncated, or
    /// mistyped input.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// ## Example
///
/// ```rust
/// use keyline_protocol::{Codec, ControlMessage, Envelope, JsonCodec, Payload};
///
/// let codec = JsonCodec;
///
/// let envelope = Envelope {
///     seq: 1,
///     timestamp: 5_000,
///     payload: Payload::Control(ControlMessage::Heartbeat { sent_at: 5_000 }),
/// };
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
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
