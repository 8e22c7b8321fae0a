//! Incremental Morse decoder: timed key edges in, characters out.
//!
//! The decoder is a pure state machine fed one [`EdgeEvent`] at a time, so
//! it can run directly on the key-capture path with no buffering delay.
//! It owns its own unit-length estimate; two decoders (one per direction,
//! or one per remote sender) never interfere with each other.

use std::collections::VecDeque;

use keyline_protocol::{EdgeDirection, EdgeEvent};

use crate::MorseConfig;
use crate::table;

/// A classified element of the incoming stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    Dot,
    Dash,
    ElementGap,
    CharacterGap,
    WordGap,
}

/// One item of decoder output.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A recognized character. `confidence` is in `[0, 1]`: how closely
    /// the marks that formed it sat to the ideal 1:3 timing.
    Character { ch: char, confidence: f32 },
    /// A dot/dash pattern with no table entry. The pattern is carried so
    /// the operator can see what the fist actually sent.
    Unknown { pattern: String },
}

/// Stateful edge-to-character decoder.
///
/// Feed edges with [`push`](Self::push); call [`flush`](Self::flush) when
/// the line goes quiet or the sender changes, so a partial character does
/// not bleed into the next transmission. State resets only through
/// [`reset`](Self::reset), never on its own.
pub struct Decoder {
    config: MorseConfig,
    /// Current unit estimate, microseconds. Invariant: always inside
    /// `[config.min_unit_us(), config.max_unit_us()]`.
    unit_us: f64,
    /// Trailing dot-equivalent mark samples feeding the estimate.
    window: VecDeque<f64>,
    last_edge: Option<EdgeEvent>,
    /// Dots and dashes of the character in progress.
    pattern: String,
    /// Per-mark closeness values for the character in progress.
    closeness: Vec<f32>,
    emitted_any: bool,
    last_was_space: bool,
    anomalies: u64,
}

impl Decoder {
    pub fn new(config: MorseConfig) -> Self {
        let config = config.validated();
        let unit_us = config.unit_us();
        Self {
            config,
            unit_us,
            window: VecDeque::new(),
            last_edge: None,
            pattern: String::new(),
            closeness: Vec::new(),
            emitted_any: false,
            last_was_space: false,
            anomalies: 0,
        }
    }

    /// The current unit-length estimate in microseconds.
    pub fn unit_us(&self) -> f64 {
        self.unit_us
    }

    /// How many edges were discarded as timing anomalies so far.
    pub fn anomaly_count(&self) -> u64 {
        self.anomalies
    }

    /// Consumes one edge and returns any characters it completed.
    ///
    /// A mark (key-down to key-up) becomes a dot or dash; a gap (key-up
    /// to key-down) may close the character and, for long gaps, the word.
    /// Non-monotonic timestamps and repeated same-direction edges are
    /// discarded and logged, never classified.
    pub fn push(&mut self, edge: EdgeEvent) -> Vec<Decoded> {
        let mut out = Vec::new();

        let prev = match self.last_edge {
            None => {
                self.last_edge = Some(edge);
                return out;
            }
            Some(prev) => prev,
        };

        if edge.at_us <= prev.at_us {
            self.anomalies += 1;
            tracing::warn!(
                at_us = edge.at_us,
                prev_us = prev.at_us,
                "non-monotonic edge timestamp discarded"
            );
            return out;
        }

        if edge.direction == prev.direction {
            self.anomalies += 1;
            tracing::warn!(
                direction = ?edge.direction,
                "repeated same-direction edge discarded"
            );
            return out;
        }

        let duration_us = (edge.at_us - prev.at_us) as f64;
        self.last_edge = Some(edge);

        match prev.direction {
            EdgeDirection::KeyDown => {
                // Mark: the key was closed for `duration_us`.
                let element = self.classify_mark(duration_us);
                self.note_mark(element, duration_us);
            }
            EdgeDirection::KeyUp => {
                // Gap: the key was open for `duration_us`.
                match self.classify_gap(duration_us) {
                    Element::ElementGap => {}
                    Element::CharacterGap => {
                        if let Some(decoded) = self.finish_char() {
                            out.push(decoded);
                        }
                    }
                    _ => {
                        if let Some(decoded) = self.finish_char() {
                            out.push(decoded);
                        }
                        if self.emitted_any && !self.last_was_space {
                            self.last_was_space = true;
                            out.push(Decoded::Character {
                                ch: ' ',
                                confidence: 1.0,
                            });
                        }
                    }
                }
            }
        }

        out
    }

    /// Emits the character in progress, if any.
    pub fn flush(&mut self) -> Option<Decoded> {
        self.finish_char()
    }

    /// Discards all state, including the adaptive estimate. For session
    /// restart only.
    pub fn reset(&mut self) {
        self.unit_us = self.config.unit_us();
        self.window.clear();
        self.last_edge = None;
        self.pattern.clear();
        self.closeness.clear();
        self.emitted_any = false;
        self.last_was_space = false;
    }

    /// Dot iff the mark is at most `dash_threshold` units; the exact
    /// threshold value is a dot, so the boundary is deterministic.
    fn classify_mark(&self, duration_us: f64) -> Element {
        if duration_us <= self.config.dash_threshold * self.unit_us {
            Element::Dot
        } else {
            Element::Dash
        }
    }

    fn classify_gap(&self, duration_us: f64) -> Element {
        let capped =
            duration_us.min(self.config.max_gap_units * self.unit_us);
        let units = capped / self.unit_us;
        if units < self.config.char_gap_threshold {
            Element::ElementGap
        } else if units <= self.config.word_gap_threshold {
            Element::CharacterGap
        } else {
            Element::WordGap
        }
    }

    /// Records a classified mark: appends to the pattern, scores its
    /// closeness to ideal timing, and feeds the adaptive estimate.
    fn note_mark(&mut self, element: Element, duration_us: f64) {
        let (symbol, ideal_units) = match element {
            Element::Dot => ('.', 1.0),
            Element::Dash => ('-', 3.0),
            _ => unreachable!("gaps are not marks"),
        };
        self.pattern.push(symbol);

        let ideal = ideal_units * self.unit_us;
        let closeness =
            1.0 - ((duration_us - ideal).abs() / ideal).min(1.0);
        self.closeness.push(closeness as f32);

        // Each mark contributes one dot-equivalent sample.
        let sample = duration_us / ideal_units;
        self.window.push_back(sample);
        while self.window.len() > self.config.adaptive_window {
            self.window.pop_front();
        }
        let mean: f64 =
            self.window.iter().sum::<f64>() / self.window.len() as f64;
        self.unit_us = mean
            .clamp(self.config.min_unit_us(), self.config.max_unit_us());
    }

    fn finish_char(&mut self) -> Option<Decoded> {
        if self.pattern.is_empty() {
            return None;
        }
        let pattern = std::mem::take(&mut self.pattern);
        let closeness = std::mem::take(&mut self.closeness);
        self.emitted_any = true;
        self.last_was_space = false;

        match table::char_for(&pattern) {
            Some(ch) => {
                let confidence = closeness.iter().copied().sum::<f32>()
                    / closeness.len() as f32;
                Some(Decoded::Character { ch, confidence })
            }
            None => {
                tracing::debug!(%pattern, "unmapped Morse pattern");
                Some(Decoded::Unknown { pattern })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: u64 = 60_000; // 20 WPM, microseconds

    fn decoder() -> Decoder {
        Decoder::new(MorseConfig::default())
    }

    /// Keys one mark of `units` dots starting at `at`, returning the
    /// time after the mark.
    fn key_mark(d: &mut Decoder, at: u64, units: u64) -> (Vec<Decoded>, u64)
    {
        let mut out = d.push(EdgeEvent::down(at));
        let end = at + units * UNIT;
        out.extend(d.push(EdgeEvent::up(end)));
        (out, end)
    }

    #[test]
    fn test_single_dot_flushes_as_e() {
        let mut d = decoder();
        let (out, _) = key_mark(&mut d, 0, 1);
        assert!(out.is_empty(), "char not complete until a gap or flush");
        match d.flush() {
            Some(Decoded::Character { ch, confidence }) => {
                assert_eq!(ch, 'E');
                assert!(confidence > 0.99);
            }
            other => panic!("expected E, got {other:?}"),
        }
    }

    #[test]
    fn test_dot_dash_boundary_is_deterministic() {
        // Exactly two units is still a dot; anything above is a dash.
        let mut d = decoder();
        d.push(EdgeEvent::down(0));
        d.push(EdgeEvent::up(2 * UNIT));
        assert_eq!(d.flush(), Some(Decoded::Character {
            ch: 'E',
            confidence: 0.0,
        }));

        let mut d = decoder();
        d.push(EdgeEvent::down(0));
        d.push(EdgeEvent::up(2 * UNIT + 1));
        match d.flush() {
            Some(Decoded::Character { ch, .. }) => assert_eq!(ch, 'T'),
            other => panic!("expected T, got {other:?}"),
        }
    }

    #[test]
    fn test_character_gap_completes_the_letter() {
        let mut d = decoder();
        // "A" = dot dash, then a 3-unit gap, then the next key-down.
        d.push(EdgeEvent::down(0));
        d.push(EdgeEvent::up(UNIT));
        d.push(EdgeEvent::down(2 * UNIT));
        d.push(EdgeEvent::up(5 * UNIT));
        let out = d.push(EdgeEvent::down(8 * UNIT));
        assert_eq!(out.len(), 1);
        match &out[0] {
            Decoded::Character { ch, .. } => assert_eq!(*ch, 'A'),
            other => panic!("expected A, got {other:?}"),
        }
    }

    #[test]
    fn test_word_gap_emits_space_between_characters() {
        let mut d = decoder();
        // "E E" with a 7-unit gap between the two dots.
        d.push(EdgeEvent::down(0));
        d.push(EdgeEvent::up(UNIT));
        let out = d.push(EdgeEvent::down(8 * UNIT));
        assert_eq!(out.len(), 2);
        assert!(matches!(
            out[0],
            Decoded::Character { ch: 'E', .. }
        ));
        assert!(matches!(out[1], Decoded::Character { ch: ' ', .. }));
    }

    #[test]
    fn test_long_idle_emits_only_one_space() {
        let mut d = decoder();
        d.push(EdgeEvent::down(0));
        d.push(EdgeEvent::up(UNIT));
        // An hour of silence, then keying resumes: one space, not many.
        let resume = UNIT + 3_600_000_000;
        let out = d.push(EdgeEvent::down(resume));
        let spaces = out
            .iter()
            .filter(|o| matches!(o, Decoded::Character { ch: ' ', .. }))
            .count();
        assert_eq!(spaces, 1);
        // The idle gap must not disturb the unit estimate.
        assert_eq!(d.unit_us(), UNIT as f64);
    }

    #[test]
    fn test_non_monotonic_timestamps_are_discarded() {
        let mut d = decoder();
        d.push(EdgeEvent::down(1_000));
        let out = d.push(EdgeEvent::up(1_000)); // zero duration
        assert!(out.is_empty());
        assert_eq!(d.anomaly_count(), 1);
        let out = d.push(EdgeEvent::up(500)); // goes backwards
        assert!(out.is_empty());
        assert_eq!(d.anomaly_count(), 2);
        // The decoder is still usable afterwards.
        d.push(EdgeEvent::up(1_000 + UNIT));
        assert_eq!(
            d.flush(),
            Some(Decoded::Character {
                ch: 'E',
                confidence: 1.0
            })
        );
    }

    #[test]
    fn test_repeated_same_direction_edges_are_discarded() {
        let mut d = decoder();
        d.push(EdgeEvent::down(0));
        let out = d.push(EdgeEvent::down(10_000));
        assert!(out.is_empty());
        assert_eq!(d.anomaly_count(), 1);
    }

    #[test]
    fn test_unknown_pattern_is_surfaced_not_dropped() {
        let mut d = decoder();
        // Eight dots: no table entry.
        let mut at = 0;
        for _ in 0..8 {
            d.push(EdgeEvent::down(at));
            d.push(EdgeEvent::up(at + UNIT));
            at += 2 * UNIT;
        }
        match d.flush() {
            Some(Decoded::Unknown { pattern }) => {
                assert_eq!(pattern, "........");
            }
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn test_estimate_follows_operator_speed_drift() {
        let mut d = decoder();
        let slow_unit = 90_000; // operator drifts toward 13 WPM
        let mut at = 0;
        for _ in 0..30 {
            d.push(EdgeEvent::down(at));
            d.push(EdgeEvent::up(at + slow_unit));
            at += slow_unit + slow_unit; // element gap at the new speed
        }
        let estimate = d.unit_us();
        assert!(
            (estimate - slow_unit as f64).abs() < 1_000.0,
            "estimate {estimate} should settle near {slow_unit}"
        );
    }

    #[test]
    fn test_reset_restores_nominal_unit() {
        let mut d = decoder();
        d.push(EdgeEvent::down(0));
        d.push(EdgeEvent::up(90_000));
        assert_ne!(d.unit_us(), 60_000.0);
        d.reset();
        assert_eq!(d.unit_us(), 60_000.0);
        assert_eq!(d.flush(), None);
    }
}
