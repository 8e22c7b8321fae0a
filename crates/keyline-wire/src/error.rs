//! Error types for the wire layer.

use keyline_protocol::{StationId, WireId};

/// Errors that can occur during wire operations.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The wire does not exist.
    #[error("wire {0} not found")]
    NotFound(WireId),

    /// The wire has no free station slots.
    #[error("wire {0} is full")]
    WireFull(WireId),

    /// The station is already on this wire.
    #[error("station {0} already on wire {1}")]
    AlreadyJoined(StationId, WireId),

    /// The station is not on this wire.
    #[error("station {0} not on wire {1}")]
    NotJoined(StationId, WireId),

    /// The station is not on any wire.
    #[error("station {0} is not on any wire")]
    NotOnAnyWire(StationId),

    /// The wire's command channel is closed or full.
    #[error("wire {0} is unavailable")]
    Unavailable(WireId),
}
