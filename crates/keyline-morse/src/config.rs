//! Codec configuration: speed, thresholds, and adaptation limits.

use serde::{Deserialize, Serialize};

/// Microseconds per dot at one word per minute, from the standard PARIS
/// calibration word (50 units per word): unit ms = 1200 / WPM.
const UNIT_US_PER_WPM: f64 = 1_200_000.0;

/// Tuning knobs for the Morse codec.
///
/// Every threshold that shapes classification is a field here rather than
/// a constant in the decoder, because they are operating-practice tuning
/// values, not facts. The defaults suit a clean fist at 20 WPM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MorseConfig {
    /// Nominal speed in words per minute; sets the initial unit length
    /// (and the fixed unit length on the encode side).
    pub wpm: f64,

    /// How many recent mark durations feed the adaptive unit estimate.
    pub adaptive_window: usize,

    /// Lower bound of the plausible speed band. The unit estimate never
    /// leaves the band no matter what the key does.
    pub min_wpm: f64,

    /// Upper bound of the plausible speed band.
    pub max_wpm: f64,

    /// A mark of at most this many units is a dot, above it a dash.
    /// 2.0 is the midpoint between the ideal dot (1) and dash (3).
    pub dash_threshold: f64,

    /// A gap of at least this many units ends the character.
    pub char_gap_threshold: f64,

    /// A gap of more than this many units also ends the word.
    pub word_gap_threshold: f64,

    /// Gaps longer than this many units are capped before
    /// classification, so an operator walking away reads as one word
    /// gap, not a runaway duration.
    pub max_gap_units: f64,
}

impl Default for MorseConfig {
    fn default() -> Self {
        Self {
            wpm: 20.0,
            adaptive_window: 20,
            min_wpm: 5.0,
            max_wpm: 60.0,
            dash_threshold: 2.0,
            char_gap_threshold: 2.0,
            word_gap_threshold: 5.0,
            max_gap_units: 20.0,
        }
    }
}

impl MorseConfig {
    /// Convenience constructor for a nominal speed with default tuning.
    pub fn with_wpm(wpm: f64) -> Self {
        Self {
            wpm,
            ..Default::default()
        }
        .validated()
    }

    /// Clamps out-of-range values so the config is safe to run with.
    ///
    /// Rules: the speed band stays positive and ordered, `wpm` sits
    /// inside it, the window holds at least one sample, and the gap
    /// thresholds stay ordered (`char <= word <= cap`).
    pub fn validated(mut self) -> Self {
        if self.min_wpm <= 0.0 {
            self.min_wpm = 1.0;
        }
        if self.max_wpm < self.min_wpm {
            self.max_wpm = self.min_wpm;
        }
        self.wpm = self.wpm.clamp(self.min_wpm, self.max_wpm);
        if self.adaptive_window == 0 {
            self.adaptive_window = 1;
        }
        if self.dash_threshold <= 1.0 {
            self.dash_threshold = 2.0;
        }
        if self.char_gap_threshold <= 1.0 {
            self.char_gap_threshold = 2.0;
        }
        if self.word_gap_threshold < self.char_gap_threshold {
            self.word_gap_threshold = self.char_gap_threshold;
        }
        if self.max_gap_units < self.word_gap_threshold {
            self.max_gap_units = self.word_gap_threshold;
        }
        self
    }

    /// The nominal unit (dot) length in microseconds.
    pub fn unit_us(&self) -> f64 {
        UNIT_US_PER_WPM / self.wpm
    }

    /// Shortest unit the adaptive estimate may reach (fastest speed).
    pub fn min_unit_us(&self) -> f64 {
        UNIT_US_PER_WPM / self.max_wpm
    }

    /// Longest unit the adaptive estimate may reach (slowest speed).
    pub fn max_unit_us(&self) -> f64 {
        UNIT_US_PER_WPM / self.min_wpm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_unit_is_60ms_at_20_wpm() {
        let config = MorseConfig::default();
        assert_eq!(config.unit_us(), 60_000.0);
    }

    #[test]
    fn test_validated_clamps_wpm_into_band() {
        let config = MorseConfig {
            wpm: 200.0,
            ..Default::default()
        }
        .validated();
        assert_eq!(config.wpm, config.max_wpm);

        let config = MorseConfig {
            wpm: 1.0,
            ..Default::default()
        }
        .validated();
        assert_eq!(config.wpm, config.min_wpm);
    }

    #[test]
    fn test_validated_repairs_threshold_ordering() {
        let config = MorseConfig {
            char_gap_threshold: 4.0,
            word_gap_threshold: 3.0,
            max_gap_units: 1.0,
            ..Default::default()
        }
        .validated();
        assert!(config.char_gap_threshold <= config.word_gap_threshold);
        assert!(config.word_gap_threshold <= config.max_gap_units);
    }

    #[test]
    fn test_validated_keeps_window_nonzero() {
        let config = MorseConfig {
            adaptive_window: 0,
            ..Default::default()
        }
        .validated();
        assert_eq!(config.adaptive_window, 1);
    }
}
