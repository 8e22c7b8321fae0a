//! Text-to-timing encoder for keyboard sending and code practice.
//!
//! The encoder is the inverse of the decoder: it turns text into a lazily
//! produced sequence of [`EdgeEvent`]s at a fixed unit length, using the
//! standard ratios: marks of 1 (dot) and 3 (dash) units, gaps of 1 unit
//! between elements, 3 between letters, 7 between words.

use std::collections::VecDeque;
use std::str::Chars;

use keyline_protocol::EdgeEvent;

use crate::{MorseConfig, MorseError, table};

/// Turns text into timed key edges.
#[derive(Debug, Clone)]
pub struct Encoder {
    unit_us: u64,
}

impl Encoder {
    pub fn new(config: &MorseConfig) -> Self {
        Self {
            unit_us: config.unit_us() as u64,
        }
    }

    /// The fixed unit length this encoder keys at, in microseconds.
    pub fn unit_us(&self) -> u64 {
        self.unit_us
    }

    /// Lazily encodes `text`.
    ///
    /// Unmappable characters surface as `Err` items; the iterator keeps
    /// going with the next character, so one stray symbol never silences
    /// the rest of the line.
    pub fn encode<'a>(&self, text: &'a str) -> Encode<'a> {
        Encode {
            chars: text.chars(),
            queue: VecDeque::new(),
            clock_us: 0,
            unit_us: self.unit_us,
            started: false,
        }
    }
}

/// Lazy edge sequence produced by [`Encoder::encode`].
pub struct Encode<'a> {
    chars: Chars<'a>,
    queue: VecDeque<EdgeEvent>,
    clock_us: u64,
    unit_us: u64,
    started: bool,
}

impl Encode<'_> {
    /// Queues the edges for one character's pattern.
    fn queue_pattern(&mut self, pattern: &str) {
        for symbol in pattern.chars() {
            let len = match symbol {
                '.' => self.unit_us,
                _ => 3 * self.unit_us,
            };
            self.queue.push_back(EdgeEvent::down(self.clock_us));
            self.queue.push_back(EdgeEvent::up(self.clock_us + len));
            // One unit between elements; two more are added at the
            // letter boundary to make the standard three.
            self.clock_us += len + self.unit_us;
        }
        self.clock_us += 2 * self.unit_us;
        self.started = true;
    }
}

impl Iterator for Encode<'_> {
    type Item = Result<EdgeEvent, MorseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(edge) = self.queue.pop_front() {
                return Some(Ok(edge));
            }
            let ch = self.chars.next()?;
            if ch == ' ' {
                if self.started {
                    // 1 (element) + 2 (letter) already elapsed; top up
                    // to the 7-unit word gap.
                    self.clock_us += 4 * self.unit_us;
                }
                continue;
            }
            match table::pattern_for(ch) {
                Some(pattern) => self.queue_pattern(pattern),
                None => return Some(Err(MorseError::Unmappable(ch))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyline_protocol::EdgeDirection;

    const UNIT: u64 = 60_000;

    fn edges(text: &str) -> Vec<EdgeEvent> {
        Encoder::new(&MorseConfig::default())
            .encode(text)
            .filter_map(Result::ok)
            .collect()
    }

    #[test]
    fn test_encodes_e_as_one_dot() {
        let out = edges("E");
        assert_eq!(out, vec![EdgeEvent::down(0), EdgeEvent::up(UNIT)]);
    }

    #[test]
    fn test_mark_and_gap_ratios_are_standard() {
        // "AN": .- / -.
        let out = edges("AN");
        // A: dot 0..1u, gap 1u, dash 2u..5u
        assert_eq!(out[0], EdgeEvent::down(0));
        assert_eq!(out[1], EdgeEvent::up(UNIT));
        assert_eq!(out[2], EdgeEvent::down(2 * UNIT));
        assert_eq!(out[3], EdgeEvent::up(5 * UNIT));
        // Letter gap of 3 units: N starts at 8u.
        assert_eq!(out[4], EdgeEvent::down(8 * UNIT));
    }

    #[test]
    fn test_word_gap_is_seven_units() {
        // "E E": dot ends at 1u, next dot must start at 8u.
        let out = edges("E E");
        assert_eq!(out[1], EdgeEvent::up(UNIT));
        assert_eq!(out[2], EdgeEvent::down(8 * UNIT));
    }

    #[test]
    fn test_edges_alternate_and_timestamps_increase() {
        let out = edges("PARIS");
        for pair in out.windows(2) {
            assert!(pair[0].at_us < pair[1].at_us);
            assert_ne!(pair[0].direction, pair[1].direction);
        }
        assert_eq!(out[0].direction, EdgeDirection::KeyDown);
    }

    #[test]
    fn test_unmappable_characters_surface_but_do_not_abort() {
        let items: Vec<_> = Encoder::new(&MorseConfig::default())
            .encode("A#B")
            .collect();
        let errs: Vec<_> =
            items.iter().filter(|i| i.is_err()).collect();
        assert_eq!(errs.len(), 1);
        assert!(matches!(
            items.iter().find(|i| i.is_err()),
            Some(Err(MorseError::Unmappable('#')))
        ));
        // B still comes through after the error.
        let ok_edges: Vec<_> =
            items.iter().filter(|i| i.is_ok()).collect();
        assert!(ok_edges.len() > 2);
    }

    #[test]
    fn test_lowercase_encodes_like_uppercase() {
        assert_eq!(edges("sos"), edges("SOS"));
    }

    #[test]
    fn test_leading_spaces_do_not_shift_the_clock() {
        assert_eq!(edges("  E"), edges("E"));
    }
}
