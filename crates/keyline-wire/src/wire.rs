//! Wire actor: an isolated Tokio task that owns one telegraph line.
//!
//! Each wire runs in its own task and is driven entirely through an mpsc
//! channel, so roster and arbitration mutations are serialized without a
//! lock and independent wires never contend with each other.

use std::collections::HashMap;
use std::time::Instant;

use keyline_protocol::{RosterEntry, StationId, TimingMessage, WireId};
use tokio::sync::{mpsc, oneshot};

use crate::arbitration::{Arbitration, Claim};
use crate::{WireConfig, WireError};

/// An outbound item from the wire actor to one station's connection
/// handler, which turns it into a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireOutbound {
    /// A relayed edge. `arrival_seq` is the actor's own stamp: every
    /// receiver sees the same authoritative ordering regardless of the
    /// sender's counter.
    Timing {
        arrival_seq: u64,
        timing: TimingMessage,
    },
    /// Membership changed.
    Roster { stations: Vec<RosterEntry> },
    /// The sender slot changed hands (`None`: line went idle).
    ActiveSender { station: Option<StationId> },
    /// Your edge was refused; `active` holds the line.
    SendRejected { active: StationId },
}

/// Channel sender for delivering outbound items to a station.
pub type StationSender = mpsc::UnboundedSender<WireOutbound>;

/// Commands sent to a wire actor through its channel.
pub(crate) enum WireCommand {
    Join {
        station: StationId,
        name: String,
        sender: StationSender,
        reply: oneshot::Sender<Result<Vec<RosterEntry>, WireError>>,
    },
    Leave {
        station: StationId,
        reply: oneshot::Sender<Result<(), WireError>>,
    },
    /// An edge from a station. Accept/reject feedback travels back on
    /// the station's outbound channel, keeping this path send-and-go.
    Timing {
        station: StationId,
        msg: TimingMessage,
    },
    GetInfo {
        reply: oneshot::Sender<WireInfo>,
    },
    Shutdown,
}

/// A snapshot of wire metadata.
#[derive(Debug, Clone)]
pub struct WireInfo {
    pub wire_id: WireId,
    pub station_count: usize,
    pub max_stations: usize,
    pub active_sender: Option<StationId>,
}

/// Handle to a running wire actor. Cheap to clone.
#[derive(Clone)]
pub struct WireHandle {
    wire_id: WireId,
    sender: mpsc::Sender<WireCommand>,
}

impl WireHandle {
    /// Returns the wire's number.
    pub fn wire_id(&self) -> WireId {
        self.wire_id
    }

    /// Adds a station to the wire, returning the roster after the join.
    pub async fn join(
        &self,
        station: StationId,
        name: String,
        sender: StationSender,
    ) -> Result<Vec<RosterEntry>, WireError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(WireCommand::Join {
                station,
                name,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| WireError::Unavailable(self.wire_id))?;
        reply_rx
            .await
            .map_err(|_| WireError::Unavailable(self.wire_id))?
    }

    /// Removes a station from the wire.
    pub async fn leave(
        &self,
        station: StationId,
    ) -> Result<(), WireError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(WireCommand::Leave {
                station,
                reply: reply_tx,
            })
            .await
            .map_err(|_| WireError::Unavailable(self.wire_id))?;
        reply_rx
            .await
            .map_err(|_| WireError::Unavailable(self.wire_id))?
    }

    /// Delivers an edge from a station (fire-and-forget; arbitration
    /// feedback arrives on the station's outbound channel).
    pub async fn send_timing(
        &self,
        station: StationId,
        msg: TimingMessage,
    ) -> Result<(), WireError> {
        self.sender
            .send(WireCommand::Timing { station, msg })
            .await
            .map_err(|_| WireError::Unavailable(self.wire_id))
    }

    /// Requests the current wire info.
    pub async fn get_info(&self) -> Result<WireInfo, WireError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(WireCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| WireError::Unavailable(self.wire_id))?;
        reply_rx
            .await
            .map_err(|_| WireError::Unavailable(self.wire_id))
    }

    /// Tells the wire to shut down.
    pub async fn shutdown(&self) -> Result<(), WireError> {
        self.sender
            .send(WireCommand::Shutdown)
            .await
            .map_err(|_| WireError::Unavailable(self.wire_id))
    }
}

/// A member as the actor sees it.
struct Member {
    name: String,
    sender: StationSender,
}

/// The internal wire actor state. Runs inside a Tokio task.
struct WireActor {
    wire_id: WireId,
    config: WireConfig,
    members: HashMap<StationId, Member>,
    arbitration: Arbitration,
    /// Authoritative per-wire stamp applied to every relayed edge.
    arrival_seq: u64,
    receiver: mpsc::Receiver<WireCommand>,
}

impl WireActor {
    async fn run(mut self) {
        tracing::info!(wire = %self.wire_id, "wire actor started");

        loop {
            // Arm a wakeup for the sender slot's expiry, if one is held.
            let deadline = self.arbitration.deadline();
            let idle_release = async move {
                match deadline {
                    Some(deadline) => {
                        tokio::time::sleep_until(deadline.into()).await
                    }
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                cmd = self.receiver.recv() => {
                    match cmd {
                        Some(WireCommand::Join { station, name, sender, reply }) => {
                            let result = self.handle_join(station, name, sender);
                            let _ = reply.send(result);
                        }
                        Some(WireCommand::Leave { station, reply }) => {
                            let result = self.handle_leave(station);
                            let _ = reply.send(result);
                        }
                        Some(WireCommand::Timing { station, msg }) => {
                            self.handle_timing(station, msg);
                        }
                        Some(WireCommand::GetInfo { reply }) => {
                            let _ = reply.send(self.info());
                        }
                        Some(WireCommand::Shutdown) | None => {
                            tracing::info!(wire = %self.wire_id, "wire shutting down");
                            break;
                        }
                    }
                }
                _ = idle_release => {
                    if let Some(released) =
                        self.arbitration.poll_idle(Instant::now())
                    {
                        tracing::info!(
                            wire = %self.wire_id,
                            station = %released,
                            "sender went idle, line released"
                        );
                        self.broadcast(WireOutbound::ActiveSender {
                            station: None,
                        });
                    }
                }
            }
        }

        tracing::info!(wire = %self.wire_id, "wire actor stopped");
    }

    fn handle_join(
        &mut self,
        station: StationId,
        name: String,
        sender: StationSender,
    ) -> Result<Vec<RosterEntry>, WireError> {
        if self.members.contains_key(&station) {
            return Err(WireError::AlreadyJoined(station, self.wire_id));
        }
        if self.members.len() >= self.config.max_stations {
            return Err(WireError::WireFull(self.wire_id));
        }

        self.members.insert(station, Member { name, sender });
        tracing::info!(
            wire = %self.wire_id,
            %station,
            stations = self.members.len(),
            "station joined wire"
        );

        let roster = self.roster();
        self.broadcast(WireOutbound::Roster {
            stations: roster.clone(),
        });
        Ok(roster)
    }

    fn handle_leave(
        &mut self,
        station: StationId,
    ) -> Result<(), WireError> {
        if self.members.remove(&station).is_none() {
            return Err(WireError::NotJoined(station, self.wire_id));
        }

        tracing::info!(
            wire = %self.wire_id,
            %station,
            stations = self.members.len(),
            "station left wire"
        );

        // A departing active sender frees the line immediately.
        if self.arbitration.release(station) {
            tracing::info!(
                wire = %self.wire_id,
                %station,
                "active sender left, line released"
            );
            self.broadcast(WireOutbound::ActiveSender { station: None });
        }

        self.broadcast(WireOutbound::Roster {
            stations: self.roster(),
        });
        Ok(())
    }

    fn handle_timing(&mut self, station: StationId, msg: TimingMessage) {
        if !self.members.contains_key(&station) {
            tracing::warn!(
                wire = %self.wire_id,
                %station,
                "timing from non-member, ignoring"
            );
            return;
        }

        match self.arbitration.try_claim(station, Instant::now()) {
            Claim::Granted { newly } => {
                if newly {
                    tracing::info!(
                        wire = %self.wire_id,
                        %station,
                        "sender slot granted"
                    );
                    self.broadcast(WireOutbound::ActiveSender {
                        station: Some(station),
                    });
                }

                self.arrival_seq += 1;
                let stamped = TimingMessage {
                    // The actor, not the frame, is the authority on who
                    // sent this.
                    station,
                    seq: msg.seq,
                    edge: msg.edge,
                };
                let outbound = WireOutbound::Timing {
                    arrival_seq: self.arrival_seq,
                    timing: stamped,
                };
                // Everyone but the originator: a station never hears
                // its own echo.
                for (member_id, member) in &self.members {
                    if *member_id != station {
                        let _ = member.sender.send(outbound.clone());
                    }
                }
            }
            Claim::Rejected { active } => {
                tracing::debug!(
                    wire = %self.wire_id,
                    %station,
                    %active,
                    "timing rejected, line busy"
                );
                self.send_to(station, WireOutbound::SendRejected {
                    active,
                });
            }
        }
    }

    fn broadcast(&self, outbound: WireOutbound) {
        for member in self.members.values() {
            let _ = member.sender.send(outbound.clone());
        }
    }

    /// Sends to a single station. Silently drops if the receiver is
    /// gone (its handler is tearing down).
    fn send_to(&self, station: StationId, outbound: WireOutbound) {
        if let Some(member) = self.members.get(&station) {
            let _ = member.sender.send(outbound);
        }
    }

    fn roster(&self) -> Vec<RosterEntry> {
        let mut entries: Vec<RosterEntry> = self
            .members
            .iter()
            .map(|(id, m)| RosterEntry {
                station_id: *id,
                name: m.name.clone(),
            })
            .collect();
        entries.sort_by_key(|e| e.station_id.0);
        entries
    }

    fn info(&self) -> WireInfo {
        WireInfo {
            wire_id: self.wire_id,
            station_count: self.members.len(),
            max_stations: self.config.max_stations,
            active_sender: self.arbitration.active(),
        }
    }
}

/// Spawns a new wire actor task and returns a handle to it.
///
/// `channel_size` bounds the command channel; when it fills, senders
/// wait rather than pile up.
pub(crate) fn spawn_wire(
    wire_id: WireId,
    config: WireConfig,
    channel_size: usize,
) -> WireHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let arbitration = Arbitration::new(config.idle_timeout);
    let actor = WireActor {
        wire_id,
        config,
        members: HashMap::new(),
        arbitration,
        arrival_seq: 0,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    WireHandle {
        wire_id,
        sender: tx,
    }
}
