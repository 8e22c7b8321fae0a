//! Error types for the station layer.

use keyline_protocol::{StationId, WireId};

/// Errors that can occur during station identity management.
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    /// The name is already connected on this wire. The joining station
    /// must pick another name; the existing session is untouched.
    #[error("identity {name:?} already connected on wire {wire}")]
    DuplicateIdentity { name: String, wire: WireId },

    /// No such station (never registered, or already removed).
    #[error("station {0} not found")]
    NotFound(StationId),
}
