//! Wire configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for one wire (every wire on a relay shares one config).
///
/// Serde-derived so a configuration loader can hand it over as a plain
/// settings structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireConfig {
    /// Maximum stations on the wire at once.
    pub max_stations: usize,

    /// How long the active sender may go silent before the sender slot
    /// is released and the line is open to the next transmitter. This
    /// is an operating-practice tuning value, not a protocol constant.
    pub idle_timeout: Duration,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            max_stations: 32,
            idle_timeout: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_sane() {
        let config = WireConfig::default();
        assert!(config.max_stations > 1);
        assert!(config.idle_timeout > Duration::ZERO);
    }
}
