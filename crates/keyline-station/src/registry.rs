//! The station registry: the relay's table of who is connected where.
//!
//! # Concurrency note
//!
//! `StationRegistry` is a plain single-owner structure: no interior
//! locking. The relay keeps it behind one mutex at a higher level; the
//! registry itself stays simple and synchronous.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use keyline_protocol::{RosterEntry, StationId, WireId};

use crate::{RegistryConfig, Station, StationError};

/// Tracks every connected station and enforces identity uniqueness.
pub struct StationRegistry {
    /// All connected stations, keyed by id.
    stations: HashMap<StationId, Station>,

    /// Index from (wire, name) to id, kept in sync with `stations`.
    /// Two stations may share a name only on different wires.
    names: HashMap<(WireId, String), StationId>,

    next_id: u64,
    config: RegistryConfig,
}

impl StationRegistry {
    /// Creates an empty registry with the given config.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            stations: HashMap::new(),
            names: HashMap::new(),
            next_id: 1,
            config,
        }
    }

    /// Admits a station onto a wire, assigning a fresh id.
    ///
    /// # Errors
    /// Returns [`StationError::DuplicateIdentity`] if `name` is already
    /// connected on `wire`. The caller must retry with another name.
    pub fn register(
        &mut self,
        wire: WireId,
        name: &str,
    ) -> Result<StationId, StationError> {
        let key = (wire, name.to_string());
        if self.names.contains_key(&key) {
            return Err(StationError::DuplicateIdentity {
                name: name.to_string(),
                wire,
            });
        }

        let station_id = StationId(self.next_id);
        self.next_id += 1;

        let station = Station {
            station_id,
            name: name.to_string(),
            wire,
            last_seen: Instant::now(),
        };
        self.names.insert(key, station_id);
        self.stations.insert(station_id, station);

        tracing::info!(%station_id, %wire, name, "station registered");
        Ok(station_id)
    }

    /// Refreshes a station's liveness clock. Call on every frame.
    ///
    /// # Errors
    /// Returns [`StationError::NotFound`] if the station is gone.
    pub fn touch(
        &mut self,
        station_id: StationId,
    ) -> Result<(), StationError> {
        let station = self
            .stations
            .get_mut(&station_id)
            .ok_or(StationError::NotFound(station_id))?;
        station.last_seen = Instant::now();
        Ok(())
    }

    /// Removes a station, returning its record.
    ///
    /// # Errors
    /// Returns [`StationError::NotFound`] if it was never registered or
    /// was already removed; removal is effectively idempotent for
    /// callers that ignore that case.
    pub fn unregister(
        &mut self,
        station_id: StationId,
    ) -> Result<Station, StationError> {
        let station = self
            .stations
            .remove(&station_id)
            .ok_or(StationError::NotFound(station_id))?;
        self.names
            .remove(&(station.wire, station.name.clone()));
        tracing::info!(%station_id, wire = %station.wire, "station unregistered");
        Ok(station)
    }

    /// Removes and returns every station silent past the liveness
    /// timeout. Call periodically from a sweep task.
    pub fn expire_stale(&mut self) -> Vec<Station> {
        let timeout =
            Duration::from_secs(self.config.liveness_timeout_secs);
        let stale: Vec<StationId> = self
            .stations
            .values()
            .filter(|s| s.last_seen.elapsed() > timeout)
            .map(|s| s.station_id)
            .collect();

        let mut expired = Vec::with_capacity(stale.len());
        for station_id in stale {
            if let Ok(station) = self.unregister(station_id) {
                tracing::info!(
                    %station_id,
                    wire = %station.wire,
                    "station expired (liveness timeout)"
                );
                expired.push(station);
            }
        }
        expired
    }

    /// Looks up a station by id.
    pub fn get(&self, station_id: &StationId) -> Option<&Station> {
        self.stations.get(station_id)
    }

    /// The roster of one wire, sorted by id for stable broadcasts.
    pub fn roster(&self, wire: WireId) -> Vec<RosterEntry> {
        let mut entries: Vec<RosterEntry> = self
            .stations
            .values()
            .filter(|s| s.wire == wire)
            .map(|s| RosterEntry {
                station_id: s.station_id,
                name: s.name.clone(),
            })
            .collect();
        entries.sort_by_key(|e| e.station_id.0);
        entries
    }

    /// Number of connected stations across all wires.
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    /// Returns `true` if nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}
