//! Hardware boundary for keyline: the key and sounder capability pair.
//!
//! The core never talks to pins or serial lines directly. It sees two
//! small contracts:
//!
//! - [`Key`] — something that produces timed contact transitions, polled
//!   without blocking so the capture loop can own its own timing.
//! - [`Sounder`] — something that reproduces transitions as clicks (or
//!   a lamp, or nothing at all).
//!
//! Concrete pin mappings live with whoever owns the real hardware; this
//! crate ships synthetic implementations good enough to run the whole
//! stack in tests and demos, plus [`play_edges`], the deadline-paced
//! driver that feeds a sounder from a buffered edge sequence.

mod error;
mod player;
mod synthetic;

pub use error::HardwareError;
pub use player::play_edges;
pub use synthetic::{RecordingSounder, ScriptedKey, SilentSounder};

use keyline_protocol::EdgeEvent;

/// A telegraph key: a source of timed contact transitions.
///
/// `poll_edge` must not block. The capture path calls it in a tight,
/// high-priority loop because Morse legibility lives or dies on
/// sub-millisecond edge timing; a key implementation that waits on
/// anything slower than a register read belongs behind a channel.
pub trait Key: Send {
    /// Returns the next captured edge, or `None` when no transition has
    /// happened since the last poll.
    fn poll_edge(&mut self) -> Option<EdgeEvent>;
}

/// A sounder (or any actuator standing in for one).
pub trait Sounder: Send {
    /// Applies one transition to the actuator.
    ///
    /// # Errors
    /// Returns [`HardwareError`] when the device cannot be driven; the
    /// caller decides whether to retry, skip, or surface it.
    fn drive_edge(&mut self, edge: EdgeEvent) -> Result<(), HardwareError>;
}
