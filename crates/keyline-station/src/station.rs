//! Station types: the relay's record of one connected participant.

use std::time::Instant;

use keyline_protocol::{StationId, WireId};
use serde::{Deserialize, Serialize};

/// Configuration for registry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// How long a station may go without any frame (timing, heartbeat,
    /// anything) before the sweep treats its connection as dead.
    pub liveness_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            liveness_timeout_secs: 45,
        }
    }
}

/// One station's identity while its connection is up.
///
/// Created at the join handshake, destroyed on leave, transport error,
/// or liveness expiry. Nothing survives a relay restart; stations simply
/// rejoin.
#[derive(Debug, Clone)]
pub struct Station {
    /// The relay-assigned id.
    pub station_id: StationId,

    /// The station's chosen display name, unique per wire.
    pub name: String,

    /// The wire this station joined.
    pub wire: WireId,

    /// Last time any frame arrived from this station.
    pub last_seen: Instant,
}
