//! Error types for the Morse codec.

/// Errors that can occur while encoding text to key timing.
///
/// The decode side never errors: timing anomalies are discarded at the
/// boundary (and counted), and unmapped patterns come out as
/// [`Decoded::Unknown`](crate::Decoded::Unknown) items.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MorseError {
    /// The character has no entry in the code table.
    #[error("no Morse mapping for character {0:?}")]
    Unmappable(char),
}
