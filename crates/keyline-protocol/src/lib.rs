//! Wire protocol for keyline.
//!
//! This crate defines the language stations and the relay speak:
//!
//! - **Types** ([`Envelope`], [`ControlMessage`], [`TimingMessage`],
//!   [`EdgeEvent`], …) — the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those structures
//!   become bytes and back.
//! - **Errors** ([`ProtocolError`]) — what can go wrong in between.
//!
//! The protocol layer sits between the transport (raw framed bytes) and
//! the wire/station layers (who is on which line). It knows nothing about
//! connections or arbitration; it only shapes messages.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ControlMessage, EdgeDirection, EdgeEvent, Envelope, Payload, RosterEntry,
    StationId, TimingMessage, WireId,
};
