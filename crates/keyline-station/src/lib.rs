//! Station identity management for the keyline relay.
//!
//! This crate answers one question for the relay: who is connected, and
//! under what name, on which wire?
//!
//! 1. **Admission** — assigning ids, rejecting duplicate identities
//!    ([`StationRegistry::register`])
//! 2. **Liveness** — expiring stations whose connection has gone quiet
//!    ([`StationRegistry::expire_stale`])
//! 3. **Rosters** — the per-wire membership the relay broadcasts
//!
//! Identity here is ephemeral by design: it exists from join to
//! disconnect and is never persisted.

mod error;
mod registry;
mod station;

pub use error::StationError;
pub use registry::StationRegistry;
pub use station::{RegistryConfig, Station};
