//! Core protocol types for keyline's wire format.
//!
//! Everything in this module travels on the wire between a station and the
//! relay: these structures are serialized to bytes, framed by the transport,
//! and deserialized on the other side.
//!
//! The protocol deliberately carries *raw key timing*, not decoded text.
//! A station's "hand" (the rhythm and weight of its keying) survives the
//! trip because receivers replay the same edge timings into their own
//! sounders and decoders.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a station, assigned by the relay at join time.
///
/// Newtype over `u64` so a station id can never be confused with a wire
/// number or a sequence counter. `#[serde(transparent)]` keeps the JSON a
/// plain number: `StationId(42)` serializes as `42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(pub u64);

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// A numbered wire: one shared telegraph line on the relay.
///
/// Stations ask for a wire by number when they join; every station on the
/// same wire hears every sender on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireId(pub u16);

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Key timing
// ---------------------------------------------------------------------------

/// Which way the key contact moved.
///
/// `KeyDown` closes the circuit (mark), `KeyUp` opens it (space).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EdgeDirection {
    KeyDown,
    KeyUp,
}

/// One key transition with its capture time.
///
/// `at_us` is monotonic microseconds relative to the sender's session
/// start; a difference of two timestamps is a real duration, but absolute
/// values from different stations are not comparable. Immutable once
/// captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeEvent {
    /// Direction of the transition.
    pub direction: EdgeDirection,
    /// Monotonic capture timestamp, microseconds.
    pub at_us: u64,
}

impl EdgeEvent {
    /// A key-down (circuit closed) edge at the given timestamp.
    pub fn down(at_us: u64) -> Self {
        Self {
            direction: EdgeDirection::KeyDown,
            at_us,
        }
    }

    /// A key-up (circuit open) edge at the given timestamp.
    pub fn up(at_us: u64) -> Self {
        Self {
            direction: EdgeDirection::KeyUp,
            at_us,
        }
    }

    /// Returns `true` for a key-down edge.
    pub fn is_down(&self) -> bool {
        matches!(self.direction, EdgeDirection::KeyDown)
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// One station as it appears in roster broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// The relay-assigned station id.
    pub station_id: StationId,
    /// The station's chosen display name (office call, operator name…).
    pub name: String,
}

// ---------------------------------------------------------------------------
// Control messages — presence, liveness, arbitration feedback
// ---------------------------------------------------------------------------

/// Presence and housekeeping messages exchanged with the relay.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON, so a join
/// looks like `{ "type": "Join", "version": 1, "wire": 11, "name": "KN" }`.
/// That keeps frames self-describing and easy to eyeball in a capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Station → Relay: first frame on a fresh connection. Asks to join
    /// `wire` under `name`. `version` lets the relay refuse incompatible
    /// stations.
    Join {
        version: u32,
        wire: WireId,
        name: String,
    },

    /// Relay → Station: join accepted. Carries the assigned id and the
    /// wire's current roster.
    JoinAck {
        station_id: StationId,
        roster: Vec<RosterEntry>,
    },

    /// Relay → Station: the wire's membership changed.
    Roster { stations: Vec<RosterEntry> },

    /// Relay → Station: the sender slot changed hands. `None` means the
    /// wire went idle and the line is up for grabs.
    ActiveSender { station: Option<StationId> },

    /// Station → Relay: liveness beacon. `sent_at` is the station's local
    /// millisecond clock, echoed back for RTT measurement.
    Heartbeat { sent_at: u64 },

    /// Relay → Station: heartbeat echo with the relay's own clock.
    HeartbeatAck { sent_at: u64, server_time: u64 },

    /// Either direction: orderly departure with a reason for the logs.
    Leave { reason: String },

    /// Relay → Station: a timing message was refused because `active`
    /// holds the sender slot. Explicit so the sender knows its keying
    /// went nowhere.
    SendRejected { active: StationId },

    /// Relay → Station: something went wrong. `code` follows HTTP
    /// conventions (400 bad frame, 409 duplicate identity, …).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Timing messages — the actual Morse
// ---------------------------------------------------------------------------

/// One key edge in flight, attributed and sequenced.
///
/// `seq` is the *per-sender* counter, assigned by the sending station and
/// strictly increasing, so receivers can spot loss and reordering from that
/// sender alone. The relay re-stamps `station` with the authenticated
/// sender id before rebroadcast; a station cannot speak under another's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingMessage {
    /// Who keyed this edge.
    pub station: StationId,
    /// Per-sender sequence number.
    pub seq: u64,
    /// The edge itself.
    pub edge: EdgeEvent,
}

// ---------------------------------------------------------------------------
// Payload and Envelope — the top-level frame
// ---------------------------------------------------------------------------

/// The content of a frame: housekeeping or key timing.
///
/// Adjacently tagged (`{ "type": "Timing", "data": { … } }`) so the
/// receiving loop can branch on the kind before touching the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    /// Presence, liveness, arbitration feedback.
    Control(ControlMessage),
    /// A key edge from some sender.
    Timing(TimingMessage),
}

/// The top-level wrapper; every frame on the wire is one `Envelope`.
///
/// `seq` is a per-connection counter on frames a station sends; on
/// rebroadcast timing frames the relay overwrites it with its own arrival
/// counter, giving every receiver the same authoritative ordering.
/// `timestamp` is milliseconds since the stamping side started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Frame ordering counter (see above for who stamps it).
    pub seq: u64,
    /// Milliseconds since the stamping side's epoch.
    pub timestamp: u64,
    /// The actual content.
    pub payload: Payload,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The wire format is a compatibility contract: a serde attribute
    //! change that reshapes the JSON breaks every deployed station. These
    //! tests pin the exact shapes.

    use super::*;

    #[test]
    fn test_station_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&StationId(42)).unwrap();
        assert_eq!(json, "42");
        let back: StationId = serde_json::from_str("42").unwrap();
        assert_eq!(back, StationId(42));
    }

    #[test]
    fn test_id_display_forms() {
        assert_eq!(StationId(7).to_string(), "S-7");
        assert_eq!(WireId(11).to_string(), "W-11");
    }

    #[test]
    fn test_edge_direction_serializes_pascal_case() {
        let json = serde_json::to_string(&EdgeDirection::KeyDown).unwrap();
        assert_eq!(json, "\"KeyDown\"");
        let json = serde_json::to_string(&EdgeDirection::KeyUp).unwrap();
        assert_eq!(json, "\"KeyUp\"");
    }

    #[test]
    fn test_edge_event_constructors() {
        let down = EdgeEvent::down(1_000);
        assert!(down.is_down());
        assert_eq!(down.at_us, 1_000);
        let up = EdgeEvent::up(61_000);
        assert!(!up.is_down());
    }

    #[test]
    fn test_join_json_format() {
        let msg = ControlMessage::Join {
            version: 1,
            wire: WireId(11),
            name: "PORTLAND".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Join");
        assert_eq!(json["wire"], 11);
        assert_eq!(json["name"], "PORTLAND");
    }

    #[test]
    fn test_join_ack_json_format() {
        let msg = ControlMessage::JoinAck {
            station_id: StationId(3),
            roster: vec![RosterEntry {
                station_id: StationId(3),
                name: "PORTLAND".into(),
            }],
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "JoinAck");
        assert_eq!(json["station_id"], 3);
        assert_eq!(json["roster"][0]["name"], "PORTLAND");
    }

    #[test]
    fn test_active_sender_none_round_trip() {
        let msg = ControlMessage::ActiveSender { station: None };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let back: ControlMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn test_send_rejected_round_trip() {
        let msg = ControlMessage::SendRejected {
            active: StationId(9),
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let back: ControlMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn test_timing_payload_json_format() {
        let payload = Payload::Timing(TimingMessage {
            station: StationId(2),
            seq: 17,
            edge: EdgeEvent::down(120_000),
        });
        let json: serde_json::Value = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "Timing");
        assert_eq!(json["data"]["seq"], 17);
        assert_eq!(json["data"]["edge"]["direction"], "KeyDown");
        assert_eq!(json["data"]["edge"]["at_us"], 120_000);
    }

    #[test]
    fn test_envelope_round_trip() {
        let envelope = Envelope {
            seq: 42,
            timestamp: 15_000,
            payload: Payload::Control(ControlMessage::Heartbeat {
                sent_at: 15_000,
            }),
        };
        let bytes = serde_json::to_vec(&envelope).unwrap();
        let back: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(envelope, back);
    }

    #[test]
    fn test_decode_garbage_returns_error() {
        let garbage = b"not json at all";
        let result: Result<Envelope, _> = serde_json::from_slice(garbage);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_unknown_control_type_returns_error() {
        let unknown = r#"{"type": "OpenCircuit", "volts": 12}"#;
        let result: Result<ControlMessage, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_wrong_shape_returns_error() {
        let wrong = r#"{"name": "hello"}"#;
        let result: Result<Envelope, _> = serde_json::from_str(wrong);
        assert!(result.is_err());
    }
}
