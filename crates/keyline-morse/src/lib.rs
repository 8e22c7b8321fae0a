//! Morse timing codec for keyline.
//!
//! Converts raw key-closure timing into characters and text back into
//! precisely timed key edges:
//!
//! - [`Decoder`] — incremental, adaptive: classifies marks and gaps
//!   against a running unit-length estimate, so it follows an operator's
//!   speed drift.
//! - [`Encoder`] — fixed-speed text-to-edges for keyboard sending and
//!   practice playback.
//! - [`MorseConfig`] — every tuning constant (speed band, thresholds,
//!   adaptation window) in one place.
//!
//! The network carries raw timing, not text; each station decodes locally.
//! That is why the decoder lives here as an ordinary value type with no
//! I/O: one instance per stream, owned by whoever reads that stream.

mod config;
mod decoder;
mod encoder;
mod error;
mod table;

pub use config::MorseConfig;
pub use decoder::{Decoded, Decoder, Element};
pub use encoder::{Encode, Encoder};
pub use error::MorseError;
pub use table::{char_for, pattern_for};
