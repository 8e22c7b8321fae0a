//! Raw-socket tests: drive the relay with hand-built frames to pin the
//! protocol surface itself — handshake ordering, version refusal, and
//! tolerance of malformed frames — independent of the `WireClient`
//! implementation.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use keyline::prelude::*;
use tokio_tungstenite::tungstenite::Message;

type RawWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

async fn start_relay() -> String {
    init_tracing();
    let server = RelayServerBuilder::new()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("relay should build");
    let addr = server.local_addr().expect("local addr").to_string();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn raw_connect(addr: &str) -> RawWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_json(ws: &mut RawWs, value: &serde_json::Value) {
    let bytes = serde_json::to_vec(value).expect("encode");
    ws.send(Message::Binary(bytes.into()))
        .await
        .expect("send");
}

/// Receives the next binary/text frame as JSON.
async fn recv_json(ws: &mut RawWs) -> serde_json::Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("ws error");
        match msg {
            Message::Binary(data) => {
                return serde_json::from_slice(&data).expect("decode");
            }
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("decode");
            }
            _ => continue,
        }
    }
}

fn join_frame(version: u32, wire: u16, name: &str) -> serde_json::Value {
    serde_json::json!({
        "seq": 0,
        "timestamp": 0,
        "payload": {
            "type": "Control",
            "data": { "type": "Join", "version": version, "wire": wire, "name": name }
        }
    })
}

#[tokio::test]
async fn test_join_ack_has_the_documented_shape() {
    let addr = start_relay().await;
    let mut ws = raw_connect(&addr).await;

    send_json(&mut ws, &join_frame(PROTOCOL_VERSION, 11, "PORTLAND"))
        .await;
    let ack = recv_json(&mut ws).await;

    assert_eq!(ack["payload"]["type"], "Control");
    assert_eq!(ack["payload"]["data"]["type"], "JoinAck");
    assert!(ack["payload"]["data"]["station_id"].is_u64());
    assert_eq!(
        ack["payload"]["data"]["roster"][0]["name"],
        "PORTLAND"
    );
}

#[tokio::test]
async fn test_wrong_version_is_refused_with_error_400() {
    let addr = start_relay().await;
    let mut ws = raw_connect(&addr).await;

    send_json(&mut ws, &join_frame(999, 11, "PORTLAND")).await;
    let reply = recv_json(&mut ws).await;

    assert_eq!(reply["payload"]["data"]["type"], "Error");
    assert_eq!(reply["payload"]["data"]["code"], 400);
}

#[tokio::test]
async fn test_first_frame_must_be_join() {
    let addr = start_relay().await;
    let mut ws = raw_connect(&addr).await;

    send_json(
        &mut ws,
        &serde_json::json!({
            "seq": 0,
            "timestamp": 0,
            "payload": {
                "type": "Control",
                "data": { "type": "Heartbeat", "sent_at": 0 }
            }
        }),
    )
    .await;

    let reply = recv_json(&mut ws).await;
    assert_eq!(reply["payload"]["data"]["type"], "Error");
    assert_eq!(reply["payload"]["data"]["code"], 400);
}

#[tokio::test]
async fn test_malformed_frames_are_discarded_but_connection_survives() {
    let addr = start_relay().await;
    let mut ws = raw_connect(&addr).await;

    send_json(&mut ws, &join_frame(PROTOCOL_VERSION, 11, "PORTLAND"))
        .await;
    let _ack = recv_json(&mut ws).await;

    // Garbage, then valid JSON of the wrong shape: both must be
    // swallowed without killing the session.
    ws.send(Message::Binary(b"not json at all".to_vec().into()))
        .await
        .expect("send");
    send_json(&mut ws, &serde_json::json!({ "telegraph": "pole" }))
        .await;

    // The connection still answers heartbeats afterwards.
    send_json(
        &mut ws,
        &serde_json::json!({
            "seq": 1,
            "timestamp": 0,
            "payload": {
                "type": "Control",
                "data": { "type": "Heartbeat", "sent_at": 42 }
            }
        }),
    )
    .await;
    let reply = recv_json(&mut ws).await;
    assert_eq!(reply["payload"]["data"]["type"], "HeartbeatAck");
    assert_eq!(reply["payload"]["data"]["sent_at"], 42);
}

#[tokio::test]
async fn test_timing_from_an_unjoined_connection_never_relays() {
    let addr = start_relay().await;

    // A properly joined listener.
    let mut listener = raw_connect(&addr).await;
    send_json(
        &mut listener,
        &join_frame(PROTOCOL_VERSION, 11, "LISTENER"),
    )
    .await;
    let _ack = recv_json(&mut listener).await;

    // A connection that skips the handshake and fires timing.
    let mut rogue = raw_connect(&addr).await;
    send_json(
        &mut rogue,
        &serde_json::json!({
            "seq": 1,
            "timestamp": 0,
            "payload": {
                "type": "Timing",
                "data": {
                    "station": 99,
                    "seq": 1,
                    "edge": { "direction": "KeyDown", "at_us": 0 }
                }
            }
        }),
    )
    .await;

    // The listener must see no timing within a comfortable window.
    let got_timing = tokio::time::timeout(Duration::from_millis(300), async {
        loop {
            let frame = recv_json(&mut listener).await;
            if frame["payload"]["type"] == "Timing" {
                return;
            }
        }
    })
    .await;
    assert!(got_timing.is_err(), "unjoined timing was relayed");
}
