//! Wire lifecycle management for keyline.
//!
//! Each wire (one shared telegraph line) runs as an isolated Tokio
//! task (actor model) owning its roster, its half-duplex arbitration
//! state, and its broadcast fan-out. Mutations on one wire are
//! serialized by its task; separate wires make progress independently.
//!
//! # Key types
//!
//! - [`WireManager`] — creates wires on demand, routes stations
//! - [`WireHandle`] — send commands to a running wire actor
//! - [`Arbitration`] — the one-active-sender state machine
//! - [`WireOutbound`] — what the actor pushes to each station's handler
//! - [`WireConfig`] — per-wire settings (capacity, idle timeout)

mod arbitration;
mod config;
mod error;
mod manager;
mod wire;

pub use arbitration::{Arbitration, Claim, SenderState};
pub use config::WireConfig;
pub use error::WireError;
pub use manager::WireManager;
pub use wire::{StationSender, WireHandle, WireInfo, WireOutbound};
