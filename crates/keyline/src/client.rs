//! `WireClient`: one station's connection to the relay.
//!
//! The client splits into a thin handle (what applications hold) and a
//! single I/O task that owns the socket. Everything the socket does
//! (receiving broadcasts, draining the outgoing edge queue, heartbeats,
//! reorder-gap timers, reconnection) happens in that one task, so
//! nothing here needs a lock around the connection.
//!
//! Key capture stays decoupled: [`WireClient::send_edge`] is synchronous
//! and only touches the bounded queue. The capture loop never waits on
//! the network.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use keyline_protocol::{
    Codec, ControlMessage, EdgeEvent, Envelope, JsonCodec, Payload,
    RosterEntry, StationId, TimingMessage, WireId,
};
use keyline_transport::{Connection, TransportError, WebSocketConnection};
use rand::Rng;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

use crate::KeylineError;
use crate::queue::EdgeQueue;
use crate::reorder::ReorderBuffer;
use crate::server::PROTOCOL_VERSION;

/// Client tuning. Every value is an operating choice, not a protocol
/// constant, so they all live here. Serde-derived so a configuration
/// loader can hand it over as a plain settings structure.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClientConfig {
    /// How long to wait for the relay's JoinAck.
    pub join_timeout: Duration,

    /// Capacity of the outgoing edge queue (drop-oldest on overflow).
    pub edge_queue: usize,

    /// How long to hold out-of-order edges before skipping a gap.
    pub reorder_timeout: Duration,

    /// How often to heartbeat so the relay knows we are alive.
    pub heartbeat_interval: Duration,

    /// Reconnection attempts before giving up and emitting `Closed`.
    pub max_reconnect_attempts: u32,

    /// First reconnection delay; doubles per attempt.
    pub reconnect_base_delay: Duration,

    /// Ceiling on the reconnection delay.
    pub reconnect_max_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(5),
            edge_queue: 256,
            reorder_timeout: Duration::from_millis(100),
            heartbeat_interval: Duration::from_secs(10),
            max_reconnect_attempts: 5,
            reconnect_base_delay: Duration::from_millis(250),
            reconnect_max_delay: Duration::from_secs(8),
        }
    }
}

/// What the client surfaces to the application.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    /// A remote station's key edge, in per-sender order. Feed it to a
    /// sounder, a decoder, or both.
    Timing {
        station: StationId,
        edge: EdgeEvent,
    },
    /// The wire's membership changed.
    Roster { stations: Vec<RosterEntry> },
    /// The sender slot changed hands.
    ActiveSender { station: Option<StationId> },
    /// Our own keying was refused; `active` holds the line.
    SendRejected { active: StationId },
    /// The transport dropped; reconnection attempt `attempt` starting.
    Reconnecting { attempt: u32 },
    /// The retry budget is spent. No more events will follow.
    Closed { reason: String },
}

/// State shared between the application-facing handle and the I/O task.
struct Shared {
    /// Our relay-assigned id. Re-assigned on reconnect.
    station_id: AtomicU64,
    /// Who holds the line, as last broadcast by the relay.
    active_sender: StdMutex<Option<StationId>>,
}

/// A station's live connection to a relay wire.
pub struct WireClient {
    wire: WireId,
    shared: Arc<Shared>,
    queue: Arc<EdgeQueue>,
    events: mpsc::UnboundedReceiver<WireEvent>,
    edge_seq: AtomicU64,
    closed: AtomicBool,
    shutdown: Arc<Notify>,
    io_task: Option<JoinHandle<()>>,
}

impl WireClient {
    /// Connects to the relay, joins `wire` as `name`, and awaits the
    /// JoinAck.
    ///
    /// # Errors
    /// - [`KeylineError::Transport`] — relay unreachable
    /// - [`KeylineError::JoinRejected`] — relay refused the handshake
    ///   (duplicate identity, version mismatch, wire full)
    /// - [`KeylineError::Timeout`] — no JoinAck in time
    pub async fn connect(
        url: &str,
        wire: WireId,
        name: &str,
        config: ClientConfig,
    ) -> Result<Self, KeylineError> {
        let codec = JsonCodec;
        let conn = WebSocketConnection::connect(url).await?;
        let (station_id, roster) =
            join_handshake(&conn, &codec, wire, name, config.join_timeout)
                .await?;

        tracing::info!(%station_id, %wire, name, "joined wire");

        let shared = Arc::new(Shared {
            station_id: AtomicU64::new(station_id.0),
            active_sender: StdMutex::new(None),
        });
        let queue = Arc::new(EdgeQueue::new(config.edge_queue));
        let shutdown = Arc::new(Notify::new());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        // The roster from the ack is the first thing the app sees.
        let _ = events_tx.send(WireEvent::Roster { stations: roster });

        let io = IoTask {
            url: url.to_string(),
            wire,
            name: name.to_string(),
            reorder: ReorderBuffer::new(config.reorder_timeout),
            config,
            codec,
            conn,
            shared: Arc::clone(&shared),
            queue: Arc::clone(&queue),
            events: events_tx,
            shutdown: Arc::clone(&shutdown),
            out_seq: 0,
        };
        let io_task = tokio::spawn(io.run());

        Ok(Self {
            wire,
            shared,
            queue,
            events: events_rx,
            edge_seq: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            shutdown,
            io_task: Some(io_task),
        })
    }

    /// Our current relay-assigned station id.
    pub fn station_id(&self) -> StationId {
        StationId(self.shared.station_id.load(Ordering::Relaxed))
    }

    /// The wire this client is on.
    pub fn wire(&self) -> WireId {
        self.wire
    }

    /// Who holds the line, as of the last relay broadcast.
    pub fn active_sender(&self) -> Option<StationId> {
        *self
            .shared
            .active_sender
            .lock()
            .expect("active sender lock poisoned")
    }

    /// Queues one local key edge for the wire.
    ///
    /// Never blocks: the edge goes onto the bounded queue and the I/O
    /// task ships it. If the queue is full the oldest queued edge is
    /// dropped instead; stale timing is worse than a gap.
    ///
    /// # Errors
    /// - [`KeylineError::NotSender`] — another station holds the line;
    ///   keying now would be rejected by the relay anyway
    /// - [`KeylineError::Disconnected`] — the client is shut down
    pub fn send_edge(&self, edge: EdgeEvent) -> Result<(), KeylineError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(KeylineError::Disconnected);
        }

        let me = self.station_id();
        if let Some(holder) = self.active_sender() {
            if holder != me {
                return Err(KeylineError::NotSender(holder));
            }
        }

        let seq = self.edge_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let msg = TimingMessage {
            station: me,
            seq,
            edge,
        };
        if !self.queue.push(msg) {
            return Err(KeylineError::Disconnected);
        }
        Ok(())
    }

    /// Receives the next wire event.
    ///
    /// Returns `None` after the client has disconnected (or emitted
    /// [`WireEvent::Closed`] and stopped).
    pub async fn next_event(&mut self) -> Option<WireEvent> {
        self.events.recv().await
    }

    /// Leaves the wire and releases the transport. Idempotent; any task
    /// blocked on this client's queue or events unblocks immediately.
    pub async fn disconnect(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.queue.close();
        self.shutdown.notify_one();
        if let Some(task) = self.io_task.take() {
            let _ =
                tokio::time::timeout(Duration::from_secs(5), task).await;
        }
    }
}

impl Drop for WireClient {
    fn drop(&mut self) {
        // A dropped client must not leave its I/O task running. The
        // graceful path is disconnect(); this is the hard stop.
        if let Some(task) = self.io_task.take() {
            task.abort();
        }
        self.queue.close();
    }
}

/// Sends the Join frame and waits for the ack.
async fn join_handshake(
    conn: &WebSocketConnection,
    codec: &JsonCodec,
    wire: WireId,
    name: &str,
    timeout: Duration,
) -> Result<(StationId, Vec<RosterEntry>), KeylineError> {
    let join = Envelope {
        seq: 0,
        timestamp: 0,
        payload: Payload::Control(ControlMessage::Join {
            version: PROTOCOL_VERSION,
            wire,
            name: name.to_string(),
        }),
    };
    let bytes = codec.encode(&join)?;
    conn.send(&bytes).await.map_err(KeylineError::Transport)?;

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let data =
            match tokio::time::timeout(remaining, conn.recv()).await {
                Ok(Ok(Some(data))) => data,
                Ok(Ok(None)) => {
                    return Err(KeylineError::Transport(
                        TransportError::ConnectionClosed(
                            "closed during join".into(),
                        ),
                    ));
                }
                Ok(Err(e)) => return Err(KeylineError::Transport(e)),
                Err(_) => {
                    return Err(KeylineError::Timeout("JoinAck"));
                }
            };

        let envelope: Envelope = codec.decode(&data)?;
        match envelope.payload {
            Payload::Control(ControlMessage::JoinAck {
                station_id,
                roster,
            }) => return Ok((station_id, roster)),
            Payload::Control(ControlMessage::Error {
                code,
                message,
            }) => {
                return Err(KeylineError::JoinRejected(format!(
                    "{code}: {message}"
                )));
            }
            _ => continue,
        }
    }
}

/// The I/O task: sole owner of the socket after the handshake.
struct IoTask {
    url: String,
    wire: WireId,
    name: String,
    config: ClientConfig,
    codec: JsonCodec,
    conn: WebSocketConnection,
    shared: Arc<Shared>,
    queue: Arc<EdgeQueue>,
    events: mpsc::UnboundedSender<WireEvent>,
    shutdown: Arc<Notify>,
    reorder: ReorderBuffer,
    out_seq: u64,
}

impl IoTask {
    async fn run(mut self) {
        let start = tokio::time::Instant::now();
        let mut heartbeat = tokio::time::interval_at(
            start + self.config.heartbeat_interval,
            self.config.heartbeat_interval,
        );

        loop {
            let gap_deadline = self.reorder.next_deadline();

            tokio::select! {
                _ = self.shutdown.notified() => {
                    self.leave_gracefully().await;
                    return;
                }

                frame = self.conn.recv() => {
                    match frame {
                        Ok(Some(data)) => self.handle_frame(&data),
                        Ok(None) | Err(_) => {
                            if !self.reconnect().await {
                                self.queue.close();
                                return;
                            }
                        }
                    }
                }

                Some(msg) = self.queue.pop() => {
                    if let Err(e) = self.send_timing(msg).await {
                        tracing::debug!(error = %e, "send failed");
                        if !self.reconnect().await {
                            self.queue.close();
                            return;
                        }
                    }
                }

                _ = heartbeat.tick() => {
                    let beat = ControlMessage::Heartbeat {
                        sent_at: start.elapsed().as_millis() as u64,
                    };
                    if self.send_control(beat).await.is_err()
                        && !self.reconnect().await
                    {
                        self.queue.close();
                        return;
                    }
                }

                _ = async move {
                    match gap_deadline {
                        Some(d) => tokio::time::sleep_until(d.into()).await,
                        None => std::future::pending().await,
                    }
                } => {
                    let released =
                        self.reorder.release_expired(Instant::now());
                    for (station, edge) in released {
                        let _ = self.events.send(WireEvent::Timing {
                            station,
                            edge,
                        });
                    }
                }
            }
        }
    }

    async fn leave_gracefully(&mut self) {
        let leave = ControlMessage::Leave {
            reason: "disconnect".into(),
        };
        let _ = self.send_control(leave).await;
        let _ = self.conn.close().await;
        self.queue.close();
        tracing::info!(wire = %self.wire, "left wire");
    }

    fn handle_frame(&mut self, data: &[u8]) {
        let envelope: Envelope = match self.codec.decode(data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(error = %e, "undecodable frame dropped");
                return;
            }
        };

        match envelope.payload {
            Payload::Timing(msg) => {
                let ready = self.reorder.accept(
                    msg.station,
                    msg.seq,
                    msg.edge,
                    Instant::now(),
                );
                for edge in ready {
                    let _ = self.events.send(WireEvent::Timing {
                        station: msg.station,
                        edge,
                    });
                }
            }

            Payload::Control(ControlMessage::Roster { stations }) => {
                let _ = self.events.send(WireEvent::Roster { stations });
            }

            Payload::Control(ControlMessage::ActiveSender {
                station,
            }) => {
                *self
                    .shared
                    .active_sender
                    .lock()
                    .expect("active sender lock poisoned") = station;
                let _ = self
                    .events
                    .send(WireEvent::ActiveSender { station });
            }

            Payload::Control(ControlMessage::SendRejected {
                active,
            }) => {
                *self
                    .shared
                    .active_sender
                    .lock()
                    .expect("active sender lock poisoned") =
                    Some(active);
                let _ =
                    self.events.send(WireEvent::SendRejected { active });
            }

            Payload::Control(ControlMessage::HeartbeatAck {
                sent_at,
                ..
            }) => {
                tracing::trace!(sent_at, "heartbeat acknowledged");
            }

            Payload::Control(ControlMessage::Error {
                code,
                message,
            }) => {
                tracing::warn!(code, %message, "relay reported an error");
            }

            Payload::Control(_) => {
                tracing::debug!("ignoring unexpected control frame");
            }
        }
    }

    async fn send_timing(
        &mut self,
        msg: TimingMessage,
    ) -> Result<(), KeylineError> {
        self.out_seq += 1;
        let envelope = Envelope {
            seq: self.out_seq,
            timestamp: msg.edge.at_us / 1_000,
            payload: Payload::Timing(msg),
        };
        let bytes = self.codec.encode(&envelope)?;
        self.conn
            .send(&bytes)
            .await
            .map_err(KeylineError::Transport)
    }

    async fn send_control(
        &mut self,
        msg: ControlMessage,
    ) -> Result<(), KeylineError> {
        self.out_seq += 1;
        let envelope = Envelope {
            seq: self.out_seq,
            timestamp: 0,
            payload: Payload::Control(msg),
        };
        let bytes = self.codec.encode(&envelope)?;
        self.conn
            .send(&bytes)
            .await
            .map_err(KeylineError::Transport)
    }

    /// Re-dials and re-joins with exponential backoff and jitter.
    /// Returns `false` once the budget is spent (after emitting
    /// `Closed`) or if a shutdown arrives mid-retry.
    async fn reconnect(&mut self) -> bool {
        // Whatever we knew about the line is stale now.
        *self
            .shared
            .active_sender
            .lock()
            .expect("active sender lock poisoned") = None;

        for attempt in 1..=self.config.max_reconnect_attempts {
            let _ = self
                .events
                .send(WireEvent::Reconnecting { attempt });

            let exp = self
                .config
                .reconnect_base_delay
                .saturating_mul(1 << (attempt - 1).min(16))
                .min(self.config.reconnect_max_delay);
            // Jitter so a relay restart does not get every station
            // back at the same instant.
            let jitter_us = rand::rng()
                .random_range(0..=exp.as_micros().max(1) as u64 / 2);
            let delay = exp + Duration::from_micros(jitter_us);

            tokio::select! {
                _ = self.shutdown.notified() => {
                    self.queue.close();
                    return false;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            tracing::info!(attempt, url = %self.url, "reconnecting");
            let conn = match WebSocketConnection::connect(&self.url).await
            {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "reconnect failed");
                    continue;
                }
            };
            match join_handshake(
                &conn,
                &self.codec,
                self.wire,
                &self.name,
                self.config.join_timeout,
            )
            .await
            {
                Ok((station_id, roster)) => {
                    self.conn = conn;
                    self.shared
                        .station_id
                        .store(station_id.0, Ordering::Relaxed);
                    // Remote sequence baselines are meaningless across
                    // a reconnect.
                    self.reorder =
                        ReorderBuffer::new(self.config.reorder_timeout);
                    let _ = self
                        .events
                        .send(WireEvent::Roster { stations: roster });
                    tracing::info!(%station_id, "rejoined wire");
                    return true;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "rejoin failed");
                }
            }
        }

        tracing::error!(
            attempts = self.config.max_reconnect_attempts,
            "reconnect budget exhausted"
        );
        let _ = self.events.send(WireEvent::Closed {
            reason: "reconnect budget exhausted".into(),
        });
        false
    }
}
