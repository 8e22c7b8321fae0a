//! # keyline
//!
//! Networked Morse telegraphy: physical or simulated keys and sounders
//! joined over shared relay "wires", with the original key timing (the
//! operator's hand) preserved end to end.
//!
//! This crate is the facade over the keyline workspace:
//!
//! - [`RelayServer`] — accepts stations, tracks identity, runs one
//!   actor per wire with half-duplex arbitration and echo-suppressed
//!   broadcast.
//! - [`WireClient`] — joins a wire, ships local key edges without ever
//!   blocking the capture path, and surfaces remote traffic as ordered
//!   [`WireEvent`]s.
//! - Re-exports of the layer crates: protocol types, the Morse codec,
//!   and the key/sounder hardware boundary.
//!
//! ## Sending and receiving
//!
//! ```rust,ignore
//! use keyline::prelude::*;
//!
//! let mut client = WireClient::connect(
//!     "ws://relay.example:7250",
//!     WireId(11),
//!     "PORTLAND",
//!     ClientConfig::default(),
//! ).await?;
//!
//! // Capture path: push raw key edges, never blocks.
//! client.send_edge(EdgeEvent::down(1_000))?;
//!
//! // Receive path: decode remote hands locally.
//! let mut decoder = Decoder::new(MorseConfig::default());
//! while let Some(event) = client.next_event().await {
//!     if let WireEvent::Timing { edge, .. } = event {
//!         for decoded in decoder.push(edge) {
//!             // display it
//!         }
//!     }
//! }
//! ```

mod client;
mod error;
mod handler;
mod queue;
mod reorder;
mod server;

pub use client::{ClientConfig, WireClient, WireEvent};
pub use error::KeylineError;
pub use server::{PROTOCOL_VERSION, RelayServer, RelayServerBuilder};

pub use keyline_hardware::{
    HardwareError, Key, RecordingSounder, ScriptedKey, SilentSounder,
    Sounder, play_edges,
};
pub use keyline_morse::{Decoded, Decoder, Encoder, MorseConfig, MorseError};
pub use keyline_protocol::{
    ControlMessage, EdgeDirection, EdgeEvent, Envelope, Payload,
    RosterEntry, StationId, TimingMessage, WireId,
};
pub use keyline_station::{RegistryConfig, StationError};
pub use keyline_wire::{WireConfig, WireError};

/// The usual imports for applications.
pub mod prelude {
    pub use crate::{
        ClientConfig, Decoded, Decoder, EdgeDirection, EdgeEvent, Encoder,
        KeylineError, MorseConfig, PROTOCOL_VERSION, RegistryConfig,
        RelayServer, RelayServerBuilder, RosterEntry, StationId,
        WireClient, WireConfig, WireEvent, WireId,
    };
}
