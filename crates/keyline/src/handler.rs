//! Per-connection handler: join handshake and frame routing.
//!
//! Each accepted connection gets its own Tokio task running this
//! handler. The flow is:
//!   1. Receive Join → validate version → admit identity
//!   2. Put the station on its wire, send JoinAck with the roster
//!   3. Pump wire outbound (broadcasts) to the socket from a side task
//!   4. Loop: receive frames → route timing / answer heartbeats
//!   5. On any exit path, tear the station down exactly once

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use keyline_protocol::{
    Codec, ControlMessage, Envelope, Payload, ProtocolError, StationId,
};
use keyline_station::StationError;
use keyline_transport::{Connection, WebSocketConnection};
use keyline_wire::{WireError, WireOutbound};
use tokio::sync::mpsc;

use crate::KeylineError;
use crate::server::{PROTOCOL_VERSION, ServerState};

/// How long a fresh connection gets to present its Join frame.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Drop guard that removes a station when its handler exits.
///
/// Cleanup must happen on every exit path, including panics. `Drop` is
/// synchronous, so the async teardown is spawned fire-and-forget.
struct StationGuard<C: Codec> {
    station_id: StationId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for StationGuard<C> {
    fn drop(&mut self) {
        let station_id = self.station_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let _ = state.wires.lock().await.leave(station_id).await;
            let _ = state.stations.lock().await.unregister(station_id);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), KeylineError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let start = Instant::now();
    let seq = Arc::new(AtomicU64::new(1));

    // --- Step 1+2: Join handshake ---
    let (station_id, outbox) =
        perform_join(&conn, &state, &seq, &start).await?;

    tracing::info!(%conn_id, %station_id, "station connected");
    let _guard = StationGuard {
        station_id,
        state: Arc::clone(&state),
    };

    // --- Step 3: outbound pump ---
    // Ends on its own when the wire actor drops this station's sender.
    let pump = {
        let conn = conn.clone();
        let codec_state = Arc::clone(&state);
        let seq = Arc::clone(&seq);
        tokio::spawn(async move {
            pump_outbound(conn, codec_state, outbox, seq, start).await;
        })
    };

    // --- Step 4: frame loop ---
    let result =
        frame_loop(&conn, &state, station_id, &seq, &start).await;

    // --- Step 5: teardown ---
    let _ = conn.close().await;
    pump.abort();
    // _guard drops here → station leaves its wire and the registry.
    result
}

/// Receives and validates the Join frame, admits the station, joins the
/// wire, and sends the JoinAck.
async fn perform_join<C: Codec>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<C>>,
    seq: &AtomicU64,
    start: &Instant,
) -> Result<(StationId, mpsc::UnboundedReceiver<WireOutbound>), KeylineError>
{
    let data = match tokio::time::timeout(JOIN_TIMEOUT, conn.recv()).await
    {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before join".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(KeylineError::Transport(e)),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage(
                "join timed out".into(),
            )
            .into());
        }
    };

    let envelope: Envelope = state.codec.decode(&data)?;
    let (version, wire, name) = match envelope.payload {
        Payload::Control(ControlMessage::Join {
            version,
            wire,
            name,
        }) => (version, wire, name),
        _ => {
            send_error(conn, state, 400, "expected Join", seq, start)
                .await?;
            return Err(ProtocolError::InvalidMessage(
                "first frame must be Join".into(),
            )
            .into());
        }
    };

    if version != PROTOCOL_VERSION {
        send_error(
            conn,
            state,
            400,
            &format!(
                "version mismatch: expected {PROTOCOL_VERSION}, got {version}"
            ),
            seq,
            start,
        )
        .await?;
        return Err(ProtocolError::InvalidMessage(
            "protocol version mismatch".into(),
        )
        .into());
    }

    // Admit the identity.
    let station_id = {
        let mut stations = state.stations.lock().await;
        match stations.register(wire, &name) {
            Ok(id) => id,
            Err(e @ StationError::DuplicateIdentity { .. }) => {
                send_error(conn, state, 409, &e.to_string(), seq, start)
                    .await?;
                return Err(KeylineError::Station(e));
            }
            Err(e) => return Err(KeylineError::Station(e)),
        }
    };

    // Put it on the wire.
    let (tx, outbox) = mpsc::unbounded_channel();
    let join_result = {
        let mut wires = state.wires.lock().await;
        wires.join(wire, station_id, name, tx).await
    };
    let roster = match join_result {
        Ok(roster) => roster,
        Err(e) => {
            let _ =
                state.stations.lock().await.unregister(station_id);
            let code = match &e {
                WireError::WireFull(_) => 503,
                _ => 400,
            };
            send_error(conn, state, code, &e.to_string(), seq, start)
                .await?;
            return Err(KeylineError::Wire(e));
        }
    };

    let ack = control_envelope(
        ControlMessage::JoinAck { station_id, roster },
        seq,
        start,
    );
    let bytes = state.codec.encode(&ack)?;
    conn.send(&bytes).await.map_err(KeylineError::Transport)?;

    Ok((station_id, outbox))
}

/// Forwards wire outbound items to the socket until the wire drops us.
async fn pump_outbound<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
    mut outbox: mpsc::UnboundedReceiver<WireOutbound>,
    seq: Arc<AtomicU64>,
    start: Instant,
) {
    while let Some(item) = outbox.recv().await {
        let envelope = match item {
            WireOutbound::Timing {
                arrival_seq,
                timing,
            } => Envelope {
                // The relay's arrival stamp: identical for every
                // receiver of this edge.
                seq: arrival_seq,
                timestamp: start.elapsed().as_millis() as u64,
                payload: Payload::Timing(timing),
            },
            WireOutbound::Roster { stations } => control_envelope(
                ControlMessage::Roster { stations },
                &seq,
                &start,
            ),
            WireOutbound::ActiveSender { station } => control_envelope(
                ControlMessage::ActiveSender { station },
                &seq,
                &start,
            ),
            WireOutbound::SendRejected { active } => control_envelope(
                ControlMessage::SendRejected { active },
                &seq,
                &start,
            ),
        };

        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "outbound encode failed");
                continue;
            }
        };
        if conn.send(&bytes).await.is_err() {
            // Socket is gone; the frame loop will notice too.
            break;
        }
    }
}

/// The post-join frame loop. Returns when the station leaves, the
/// connection drops, or liveness runs out.
async fn frame_loop<C: Codec>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<C>>,
    station_id: StationId,
    seq: &AtomicU64,
    start: &Instant,
) -> Result<(), KeylineError> {
    loop {
        let data = match tokio::time::timeout(
            state.liveness_timeout,
            conn.recv(),
        )
        .await
        {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%station_id, "connection closed cleanly");
                return Ok(());
            }
            Ok(Err(e)) => {
                tracing::debug!(%station_id, error = %e, "recv error");
                return Err(KeylineError::Transport(e));
            }
            Err(_) => {
                tracing::info!(%station_id, "station liveness timed out");
                return Ok(());
            }
        };

        // A malformed frame is logged and discarded; the connection
        // stays up.
        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(
                    %station_id, error = %e, "failed to decode frame"
                );
                continue;
            }
        };

        // Any well-formed frame proves the station is alive.
        let _ = state.stations.lock().await.touch(station_id);

        match envelope.payload {
            Payload::Timing(msg) => {
                let result = state
                    .wires
                    .lock()
                    .await
                    .route_timing(station_id, msg)
                    .await;
                if let Err(e) = result {
                    send_error(
                        conn,
                        state,
                        400,
                        &e.to_string(),
                        seq,
                        start,
                    )
                    .await?;
                }
            }

            Payload::Control(ControlMessage::Heartbeat { sent_at }) => {
                let ack = control_envelope(
                    ControlMessage::HeartbeatAck {
                        sent_at,
                        server_time: start.elapsed().as_millis() as u64,
                    },
                    seq,
                    start,
                );
                let bytes = state.codec.encode(&ack)?;
                conn.send(&bytes)
                    .await
                    .map_err(KeylineError::Transport)?;
            }

            Payload::Control(ControlMessage::Leave { reason }) => {
                tracing::info!(%station_id, %reason, "station left");
                return Ok(());
            }

            Payload::Control(_) => {
                tracing::debug!(
                    %station_id,
                    "ignoring unexpected control frame"
                );
            }
        }
    }
}

/// Builds a control envelope with the next connection sequence number.
fn control_envelope(
    msg: ControlMessage,
    seq: &AtomicU64,
    start: &Instant,
) -> Envelope {
    Envelope {
        seq: seq.fetch_add(1, Ordering::Relaxed),
        timestamp: start.elapsed().as_millis() as u64,
        payload: Payload::Control(msg),
    }
}

/// Sends a ControlMessage::Error frame.
async fn send_error<C: Codec>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<C>>,
    code: u16,
    message: &str,
    seq: &AtomicU64,
    start: &Instant,
) -> Result<(), KeylineError> {
    let envelope = control_envelope(
        ControlMessage::Error {
            code,
            message: message.to_string(),
        },
        seq,
        start,
    );
    let bytes = state.codec.encode(&envelope)?;
    conn.send(&bytes).await.map_err(KeylineError::Transport)?;
    Ok(())
}
