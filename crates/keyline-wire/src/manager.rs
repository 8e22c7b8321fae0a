//! Wire manager: creates wire actors on demand and routes stations.

use std::collections::HashMap;

use keyline_protocol::{RosterEntry, StationId, TimingMessage, WireId};

use crate::wire::spawn_wire;
use crate::{StationSender, WireConfig, WireError, WireHandle, WireInfo};

/// Default command channel size for wire actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Tracks all live wires and which station is on which.
///
/// Wires come into existence when the first station asks for them and
/// are plain numbers from the station's point of view, so there is no
/// separate "create wire" operation.
pub struct WireManager {
    /// Live wires, keyed by number.
    wires: HashMap<WireId, WireHandle>,

    /// Maps each station to the wire it is on.
    /// A station is on at most one wire at a time (key invariant).
    station_wires: HashMap<StationId, WireId>,

    /// Shared settings applied to each wire as it is created.
    config: WireConfig,
}

impl WireManager {
    pub fn new(config: WireConfig) -> Self {
        Self {
            wires: HashMap::new(),
            station_wires: HashMap::new(),
            config,
        }
    }

    /// Puts a station on a wire, spinning the wire up if it does not
    /// exist yet. Returns the roster after the join.
    pub async fn join(
        &mut self,
        wire_id: WireId,
        station: StationId,
        name: String,
        sender: StationSender,
    ) -> Result<Vec<RosterEntry>, WireError> {
        if let Some(current) = self.station_wires.get(&station) {
            return Err(WireError::AlreadyJoined(station, *current));
        }

        let handle = self.wires.entry(wire_id).or_insert_with(|| {
            tracing::info!(wire = %wire_id, "wire created");
            spawn_wire(wire_id, self.config.clone(), DEFAULT_CHANNEL_SIZE)
        });

        let roster = handle.join(station, name, sender).await?;
        self.station_wires.insert(station, wire_id);
        Ok(roster)
    }

    /// Removes a station from its wire. Empty wires are torn down.
    pub async fn leave(
        &mut self,
        station: StationId,
    ) -> Result<(), WireError> {
        let wire_id = self
            .station_wires
            .remove(&station)
            .ok_or(WireError::NotOnAnyWire(station))?;

        let Some(handle) = self.wires.get(&wire_id) else {
            return Ok(());
        };
        handle.leave(station).await?;

        if let Ok(info) = handle.get_info().await {
            if info.station_count == 0 {
                let _ = handle.shutdown().await;
                self.wires.remove(&wire_id);
                tracing::info!(wire = %wire_id, "empty wire closed");
            }
        }
        Ok(())
    }

    /// Routes an edge from a station to its wire.
    pub async fn route_timing(
        &self,
        station: StationId,
        msg: TimingMessage,
    ) -> Result<(), WireError> {
        let wire_id = self
            .station_wires
            .get(&station)
            .ok_or(WireError::NotOnAnyWire(station))?;

        let handle = self
            .wires
            .get(wire_id)
            .ok_or(WireError::NotFound(*wire_id))?;

        handle.send_timing(station, msg).await
    }

    /// The wire a station is currently on, if any.
    pub fn wire_of(&self, station: &StationId) -> Option<WireId> {
        self.station_wires.get(station).copied()
    }

    /// Info for one wire.
    pub async fn wire_info(
        &self,
        wire_id: WireId,
    ) -> Result<WireInfo, WireError> {
        let handle = self
            .wires
            .get(&wire_id)
            .ok_or(WireError::NotFound(wire_id))?;
        handle.get_info().await
    }

    /// Number of live wires.
    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    /// All live wire numbers.
    pub fn wire_ids(&self) -> Vec<WireId> {
        self.wires.keys().copied().collect()
    }
}
