//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire frames.
///
/// A `ProtocolError` always means the problem is in serialization or frame
/// content, never in networking or wire management; those layers have
/// their own error types.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, wrong
    /// types, or a truncated frame.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed but violates protocol rules: a timing
    /// message before the join handshake, or an unsupported version.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
