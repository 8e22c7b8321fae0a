//! Unified error type for the keyline facade.

use keyline_protocol::{ProtocolError, StationId};
use keyline_station::StationError;
use keyline_transport::TransportError;
use keyline_wire::WireError;

/// Top-level error wrapping every layer's error, plus the client-side
/// conditions that only exist at this altitude.
///
/// The `#[from]` variants let `?` convert layer errors automatically, so
/// facade code and applications deal with one type.
#[derive(Debug, thiserror::Error)]
pub enum KeylineError {
    /// A transport-level error (connect, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A station-identity error (duplicate identity, unknown station).
    #[error(transparent)]
    Station(#[from] StationError),

    /// A wire-level error (full, not joined, unavailable).
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Another station holds the line; the edge was not sent. Returned
    /// to the caller as a result, never an abort.
    #[error("not the active sender (line held by {0})")]
    NotSender(StationId),

    /// The relay refused the join handshake.
    #[error("join rejected: {0}")]
    JoinRejected(String),

    /// The client is disconnected (or was told to disconnect).
    #[error("disconnected")]
    Disconnected,

    /// A bounded wait expired.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_errors_convert_via_from() {
        let err = TransportError::ConnectionClosed("gone".into());
        let top: KeylineError = err.into();
        assert!(matches!(top, KeylineError::Transport(_)));
        assert!(top.to_string().contains("gone"));

        let err = ProtocolError::InvalidMessage("bad".into());
        let top: KeylineError = err.into();
        assert!(matches!(top, KeylineError::Protocol(_)));
    }

    #[test]
    fn test_not_sender_names_the_holder() {
        let err = KeylineError::NotSender(StationId(4));
        assert!(err.to_string().contains("S-4"));
    }
}
