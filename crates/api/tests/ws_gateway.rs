//! End-to-end tests: a real server, a WebSocket client, and a build job
//! whose events travel orchestrator -> bus -> gateway -> socket.

mod common;

use std::time::Duration;

use buildcast_api::app::build_router;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(state: buildcast_api::state::AppState) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });
    addr
}

/// Next JSON text frame, skipping control frames.
async fn next_frame(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(10), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Like [`next_frame`] but gives up quietly after `wait`.
async fn try_next_frame(client: &mut Client, wait: Duration) -> Option<Value> {
    tokio::time::timeout(wait, next_frame(client)).await.ok()
}

async fn send(client: &mut Client, frame: Value) {
    client
        .send(Message::Text(frame.to_string().into()))
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Test: clients get a connected frame and answers to commands
// ---------------------------------------------------------------------------

#[tokio::test]
async fn client_commands_round_trip() {
    let t = common::start_services().await;
    let addr = serve(t.services.state.clone()).await;

    let (mut client, _) = connect_async(format!("ws://{addr}/api/v1/ws")).await.unwrap();

    let connected = next_frame(&mut client).await;
    assert_eq!(connected["event"], "connected");
    assert!(connected["data"]["session_id"].is_string());

    send(&mut client, json!({ "event": "ping" })).await;
    assert_eq!(next_frame(&mut client).await["event"], "pong");

    send(&mut client, json!({ "event": "join_room", "data": { "room": "user:alice" } })).await;
    let joined = next_frame(&mut client).await;
    assert_eq!(joined["event"], "room_joined");
    assert_eq!(joined["data"]["room"], "user:alice");

    send(&mut client, json!({ "event": "get_status" })).await;
    let status = next_frame(&mut client).await;
    assert_eq!(status["event"], "status");
    assert_eq!(status["data"]["stats"]["current_connections"], 1);
    assert_eq!(status["data"]["stats"]["rooms"], 1);

    send(&mut client, json!({ "event": "launch_rockets" })).await;
    assert_eq!(next_frame(&mut client).await["event"], "error");

    client.close(None).await.unwrap();
    t.services.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: job lifecycle events reach the owner's room only
// ---------------------------------------------------------------------------

#[tokio::test]
async fn job_events_reach_owner_room() {
    let t = common::start_services().await;
    let state = t.services.state.clone();
    let addr = serve(state.clone()).await;

    let (mut alice, _) = connect_async(format!("ws://{addr}/api/v1/ws")).await.unwrap();
    let (mut bob, _) = connect_async(format!("ws://{addr}/api/v1/ws")).await.unwrap();
    assert_eq!(next_frame(&mut alice).await["event"], "connected");
    assert_eq!(next_frame(&mut bob).await["event"], "connected");

    send(&mut alice, json!({ "event": "join_room", "data": { "room": "user:alice" } })).await;
    assert_eq!(next_frame(&mut alice).await["event"], "room_joined");
    send(&mut bob, json!({ "event": "join_room", "data": { "room": "user:bob" } })).await;
    assert_eq!(next_frame(&mut bob).await["event"], "room_joined");

    let job_id = state
        .orchestrator
        .submit("alice", json!({ "device_name": "x86_64" }))
        .await
        .unwrap();

    // Terminal events are Critical and may overtake queued log lines, so
    // collect until the alias arrives and then drain the stragglers.
    let mut frames = Vec::new();
    loop {
        let frame = next_frame(&mut alice).await;
        assert_ne!(frame["event"], "compile_failed", "job failed: {frame}");
        let done = frame["event"] == "compile_complete";
        frames.push(frame);
        if done {
            break;
        }
    }
    while let Some(frame) = try_next_frame(&mut alice, Duration::from_millis(500)).await {
        frames.push(frame);
    }

    let seen: Vec<&str> = frames.iter().filter_map(|f| f["event"].as_str()).collect();
    for event in ["compile_started", "compile_log", "compile_status", "compile_completed"] {
        assert!(seen.contains(&event), "missing {event} in {seen:?}");
    }

    let completed_at = seen.iter().position(|e| *e == "compile_completed").unwrap();
    assert_eq!(seen[completed_at + 1], "compile_complete");
    let completed = &frames[completed_at];
    assert_eq!(completed["data"]["job_id"], job_id.as_str());
    assert_eq!(completed["data"]["artifacts"][0]["name"], "fw.bin");

    // Bob's room saw nothing; his next frame is the reply to his own ping.
    send(&mut bob, json!({ "event": "ping" })).await;
    assert_eq!(next_frame(&mut bob).await["event"], "pong");

    t.services.shutdown().await;
}
