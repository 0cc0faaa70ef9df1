use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use buildcast_events::EventBus;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;
use crate::ws::manager::{event_frame, WsManager};

/// Commands a client may send as JSON text frames, shaped like outbound
/// frames: `{"event": "join_room", "data": {"room": "user:alice"}}`.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
enum ClientCommand {
    Ping,
    JoinRoom { room: String },
    LeaveRoom { room: String },
    Subscribe { events: Vec<String> },
    Unsubscribe { events: Vec<String> },
    GetStatus,
}

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the session is registered with `WsManager` and
/// managed by a sender task plus the receive loop.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_agent))
}

/// Manage a single WebSocket session after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the session and queues the `connected` frame.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Answers inbound commands on the current task.
///   4. Cleans up on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState, user_agent: Option<String>) {
    let ws_manager = Arc::clone(&state.ws_manager);
    let session_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(session_id = %session_id, user_agent = ?user_agent, "WebSocket connected");

    let mut rx = ws_manager.connect(session_id.clone(), user_agent).await;
    ws_manager
        .send_to(
            &session_id,
            event_frame(
                "connected",
                &json!({
                    "message": "Connected to build server",
                    "server_time": chrono::Utc::now(),
                    "session_id": session_id,
                }),
            ),
        )
        .await;

    let (mut sink, mut stream) = socket.split();

    let sender_session_id = session_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(session_id = %sender_session_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) | Ok(Message::Ping(_)) => {
                ws_manager.heartbeat(&session_id).await;
            }
            Ok(Message::Text(text)) => {
                ws_manager.record_received();
                let reply =
                    handle_command(&ws_manager, &state.event_bus, &session_id, text.as_str())
                        .await;
                ws_manager.send_to(&session_id, reply).await;
            }
            Ok(Message::Binary(_)) => {
                ws_manager.record_received();
                ws_manager.record_error();
                let reply = event_frame(
                    "error",
                    &json!({ "message": "binary frames are not supported" }),
                );
                ws_manager.send_to(&session_id, reply).await;
            }
            Err(e) => {
                ws_manager.record_error();
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    ws_manager.disconnect(&session_id).await;
    send_task.abort();
    tracing::info!(session_id = %session_id, "WebSocket disconnected");
}

/// Apply one inbound command and build the reply frame.
async fn handle_command(
    ws_manager: &WsManager,
    bus: &EventBus,
    session_id: &str,
    text: &str,
) -> Message {
    let command: ClientCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            ws_manager.record_error();
            tracing::debug!(session_id, error = %e, "Unrecognised WebSocket command");
            return event_frame("error", &json!({ "message": format!("invalid command: {e}") }));
        }
    };

    match command {
        ClientCommand::Ping => {
            ws_manager.heartbeat(session_id).await;
            event_frame("pong", &json!({ "timestamp": chrono::Utc::now() }))
        }
        ClientCommand::JoinRoom { room } => {
            ws_manager.join_room(session_id, &room).await;
            event_frame(
                "room_joined",
                &json!({ "room": room, "message": format!("Joined room {room}") }),
            )
        }
        ClientCommand::LeaveRoom { room } => {
            ws_manager.leave_room(session_id, &room).await;
            event_frame(
                "room_left",
                &json!({ "room": room, "message": format!("Left room {room}") }),
            )
        }
        ClientCommand::Subscribe { events } => {
            ws_manager.subscribe(session_id, &events).await;
            event_frame(
                "subscribed",
                &json!({
                    "message": format!("Subscribed to {} events", events.len()),
                    "events": events,
                }),
            )
        }
        ClientCommand::Unsubscribe { events } => {
            ws_manager.unsubscribe(session_id, &events).await;
            event_frame(
                "unsubscribed",
                &json!({
                    "message": format!("Unsubscribed from {} events", events.len()),
                    "events": events,
                }),
            )
        }
        ClientCommand::GetStatus => {
            let now = chrono::Utc::now();
            let uptime_secs = ws_manager
                .session(session_id)
                .await
                .map_or(0.0, |s| (now - s.connected_at).num_milliseconds() as f64 / 1000.0);
            event_frame(
                "status",
                &json!({
                    "server_time": now,
                    "uptime_secs": uptime_secs,
                    "stats": ws_manager.stats().await,
                    "bus": bus.stats().await,
                }),
            )
        }
    }
}
