//! Half-duplex sender arbitration.
//!
//! A wire is a party line: everyone hears everything, and exactly one
//! station may key at a time. The rule is a two-state machine,
//! `Idle ⇄ Active(station)`, owned by the wire actor so every mutation
//! is serialized. The clock is passed in, which keeps this module pure
//! and testable without a runtime.

use std::time::{Duration, Instant};

use keyline_protocol::StationId;

/// Who currently holds the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// Nobody is sending; the first edge wins the slot.
    Idle,
    /// `station` holds the slot; `last_edge` is its most recent keying.
    Active {
        station: StationId,
        last_edge: Instant,
    },
}

/// Outcome of a station attempting to key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The edge is accepted. `newly` is `true` when the slot just
    /// changed hands (time to announce the new sender).
    Granted { newly: bool },
    /// Another station holds the line and has not gone idle yet.
    Rejected { active: StationId },
}

/// The arbitration state machine for one wire.
#[derive(Debug)]
pub struct Arbitration {
    state: SenderState,
    idle_timeout: Duration,
}

impl Arbitration {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            state: SenderState::Idle,
            idle_timeout,
        }
    }

    /// The station currently holding the slot, if any.
    pub fn active(&self) -> Option<StationId> {
        match self.state {
            SenderState::Idle => None,
            SenderState::Active { station, .. } => Some(station),
        }
    }

    /// When the current slot will expire if the sender stays silent.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            SenderState::Idle => None,
            SenderState::Active { last_edge, .. } => {
                Some(last_edge + self.idle_timeout)
            }
        }
    }

    /// A station keyed an edge at `now`: grant or reject.
    ///
    /// The holder refreshes its own slot. Anyone else is rejected until
    /// the holder has been silent for the full idle timeout, at which
    /// point the claimant takes the slot over.
    pub fn try_claim(&mut self, station: StationId, now: Instant) -> Claim {
        match self.state {
            SenderState::Idle => {
                self.state = SenderState::Active {
                    station,
                    last_edge: now,
                };
                Claim::Granted { newly: true }
            }
            SenderState::Active {
                station: holder,
                last_edge,
            } => {
                if holder == station {
                    self.state = SenderState::Active {
                        station,
                        last_edge: now,
                    };
                    return Claim::Granted { newly: false };
                }
                if now.duration_since(last_edge) >= self.idle_timeout {
                    // The holder went quiet; the line changes hands.
                    self.state = SenderState::Active {
                        station,
                        last_edge: now,
                    };
                    return Claim::Granted { newly: true };
                }
                Claim::Rejected { active: holder }
            }
        }
    }

    /// Releases the slot if `station` holds it. Returns `true` if the
    /// state changed. Used when the holder leaves or disconnects.
    pub fn release(&mut self, station: StationId) -> bool {
        if self.active() == Some(station) {
            self.state = SenderState::Idle;
            return true;
        }
        false
    }

    /// Releases the slot if the holder has been silent past the idle
    /// timeout as of `now`. Returns the released station.
    pub fn poll_idle(&mut self, now: Instant) -> Option<StationId> {
        if let SenderState::Active { station, last_edge } = self.state {
            if now.duration_since(last_edge) >= self.idle_timeout {
                self.state = SenderState::Idle;
                return Some(station);
            }
        }
        None
    }
}
