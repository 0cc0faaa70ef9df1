use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::Message;
use buildcast_core::types::Timestamp;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Build a JSON text frame `{"event": <name>, "data": <payload>}`.
pub fn event_frame(event: &str, data: &serde_json::Value) -> Message {
    let body = serde_json::json!({ "event": event, "data": data });
    Message::Text(body.to_string().into())
}

/// State kept for one live session.
struct WsSession {
    user_agent: Option<String>,
    sender: WsSender,
    connected_at: Timestamp,
    /// Refreshed by `ping` commands and Pong frames.
    last_heartbeat: Instant,
    rooms: HashSet<String>,
    /// Empty means "every event".
    subscriptions: HashSet<String>,
    /// Cleared when a send on `sender` fails.
    active: bool,
}

impl WsSession {
    fn wants(&self, event: &str) -> bool {
        self.subscriptions.is_empty() || self.subscriptions.contains(event)
    }
}

/// Read-only view of a session, as returned by [`WsManager::sessions`].
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub user_agent: Option<String>,
    pub connected_at: Timestamp,
    /// Seconds since the last heartbeat.
    pub idle_secs: f64,
    pub rooms: Vec<String>,
    pub subscriptions: Vec<String>,
    pub active: bool,
}

/// Gateway counters, as returned by [`WsManager::stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WsStats {
    pub total_connections: u64,
    pub current_connections: usize,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub errors: u64,
    pub active_sessions: usize,
    pub rooms: usize,
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<String, WsSession>,
    /// Room name to member session ids. Empty rooms are removed.
    rooms: HashMap<String, HashSet<String>>,
}

impl Registry {
    /// Remove a session and its room memberships.
    fn detach(&mut self, session_id: &str) -> Option<WsSession> {
        let session = self.sessions.remove(session_id)?;
        for room in &session.rooms {
            if let Some(members) = self.rooms.get_mut(room) {
                members.remove(session_id);
                if members.is_empty() {
                    self.rooms.remove(room);
                }
            }
        }
        Some(session)
    }
}

/// Registry of live WebSocket sessions, their rooms and subscriptions.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
pub struct WsManager {
    registry: RwLock<Registry>,
    total_connections: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    errors: AtomicU64,
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            total_connections: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    // ---- lifecycle ----

    /// Register a new session.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink. Reusing a live id replaces
    /// the old session.
    pub async fn connect(
        &self,
        session_id: String,
        user_agent: Option<String>,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = WsSession {
            user_agent,
            sender: tx,
            connected_at: chrono::Utc::now(),
            last_heartbeat: Instant::now(),
            rooms: HashSet::new(),
            subscriptions: HashSet::new(),
            active: true,
        };

        let mut registry = self.registry.write().await;
        registry.detach(&session_id);
        registry.sessions.insert(session_id, session);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        rx
    }

    /// Remove a session. Returns `false` if it was not registered.
    pub async fn disconnect(&self, session_id: &str) -> bool {
        self.registry.write().await.detach(session_id).is_some()
    }

    /// Send a `disconnect_notice` frame and a Close frame, then remove the
    /// session.
    pub async fn disconnect_with_notice(&self, session_id: &str, reason: &str) -> bool {
        let Some(session) = self.registry.write().await.detach(session_id) else {
            return false;
        };
        let notice = event_frame(
            "disconnect_notice",
            &serde_json::json!({
                "reason": reason,
                "timestamp": chrono::Utc::now(),
            }),
        );
        if session.sender.send(notice).is_ok() {
            self.messages_sent.fetch_add(1, Ordering::Relaxed);
        }
        let _ = session.sender.send(Message::Close(None));
        tracing::info!(session_id, reason, "Disconnected WebSocket session");
        true
    }

    /// Close and remove every session whose last heartbeat is older than
    /// `timeout`. Returns the evicted ids.
    pub async fn evict_stale(&self, timeout: Duration) -> Vec<String> {
        let mut registry = self.registry.write().await;
        let stale: Vec<String> = registry
            .sessions
            .iter()
            .filter(|(_, s)| s.last_heartbeat.elapsed() > timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for session_id in &stale {
            if let Some(session) = registry.detach(session_id) {
                let _ = session.sender.send(Message::Close(None));
                tracing::warn!(
                    session_id = %session_id,
                    idle_secs = session.last_heartbeat.elapsed().as_secs(),
                    "WebSocket heartbeat timed out, evicting session",
                );
            }
        }
        stale
    }

    /// Disconnect, with notice, every session that is marked inactive or
    /// silent for more than twice `timeout`. Returns how many were removed.
    pub async fn cleanup_inactive(&self, timeout: Duration) -> usize {
        let inactive: Vec<String> = {
            let registry = self.registry.read().await;
            registry
                .sessions
                .iter()
                .filter(|(_, s)| !s.active || s.last_heartbeat.elapsed() > timeout * 2)
                .map(|(id, _)| id.clone())
                .collect()
        };

        let mut removed = 0;
        for session_id in &inactive {
            if self
                .disconnect_with_notice(session_id, "Inactive client cleanup")
                .await
            {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(removed, "Cleaned up inactive WebSocket sessions");
        }
        removed
    }

    /// Send a Close frame to every connection, then clear the registry.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops accepting new connections.
    pub async fn shutdown_all(&self) {
        let mut registry = self.registry.write().await;
        let count = registry.sessions.len();
        for session in registry.sessions.values() {
            let _ = session.sender.send(Message::Close(None));
        }
        registry.sessions.clear();
        registry.rooms.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    // ---- per-session state ----

    /// Refresh the session's heartbeat. Returns `false` for unknown ids.
    pub async fn heartbeat(&self, session_id: &str) -> bool {
        match self.registry.write().await.sessions.get_mut(session_id) {
            Some(session) => {
                session.last_heartbeat = Instant::now();
                session.active = true;
                true
            }
            None => false,
        }
    }

    pub async fn join_room(&self, session_id: &str, room: &str) -> bool {
        let mut registry = self.registry.write().await;
        let Some(session) = registry.sessions.get_mut(session_id) else {
            return false;
        };
        session.rooms.insert(room.to_string());
        registry
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(session_id.to_string());
        tracing::debug!(session_id, room, "Session joined room");
        true
    }

    pub async fn leave_room(&self, session_id: &str, room: &str) -> bool {
        let mut registry = self.registry.write().await;
        let Some(session) = registry.sessions.get_mut(session_id) else {
            return false;
        };
        let was_member = session.rooms.remove(room);
        if let Some(members) = registry.rooms.get_mut(room) {
            members.remove(session_id);
            if members.is_empty() {
                registry.rooms.remove(room);
            }
        }
        tracing::debug!(session_id, room, "Session left room");
        was_member
    }

    /// Restrict broadcast delivery for the session to the given events.
    pub async fn subscribe(&self, session_id: &str, events: &[String]) -> bool {
        match self.registry.write().await.sessions.get_mut(session_id) {
            Some(session) => {
                session.subscriptions.extend(events.iter().cloned());
                true
            }
            None => false,
        }
    }

    pub async fn unsubscribe(&self, session_id: &str, events: &[String]) -> bool {
        match self.registry.write().await.sessions.get_mut(session_id) {
            Some(session) => {
                for event in events {
                    session.subscriptions.remove(event);
                }
                true
            }
            None => false,
        }
    }

    // ---- delivery ----

    /// Send a message to one session.
    pub async fn send_to(&self, session_id: &str, message: Message) -> bool {
        self.deliver(message, |id, _| id == session_id).await == 1
    }

    /// Send an event frame to the listed sessions. Unknown ids are skipped.
    pub async fn send_to_sessions(
        &self,
        session_ids: &[String],
        event: &str,
        data: &serde_json::Value,
    ) -> usize {
        let wanted: HashSet<&str> = session_ids.iter().map(String::as_str).collect();
        self.deliver(event_frame(event, data), |id, _| wanted.contains(id))
            .await
    }

    /// Send an event frame to every member of `room`.
    pub async fn send_to_room(&self, room: &str, event: &str, data: &serde_json::Value) -> usize {
        self.deliver(event_frame(event, data), |_, s| s.rooms.contains(room))
            .await
    }

    /// Send an event frame to every session subscribed to `event` (sessions
    /// without subscriptions receive everything).
    pub async fn broadcast_event(&self, event: &str, data: &serde_json::Value) -> usize {
        self.deliver(event_frame(event, data), |_, s| s.wants(event))
            .await
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let registry = self.registry.read().await;
        for session in registry.sessions.values() {
            let _ = session.sender.send(Message::Ping(Bytes::new()));
        }
    }

    /// Push `message` to every session accepted by `accept`. Sessions whose
    /// channel is closed are marked inactive and counted as errors.
    async fn deliver<F>(&self, message: Message, accept: F) -> usize
    where
        F: Fn(&str, &WsSession) -> bool,
    {
        let mut delivered = 0;
        let mut failed = Vec::new();
        {
            let registry = self.registry.read().await;
            for (id, session) in &registry.sessions {
                if !accept(id, session) {
                    continue;
                }
                if session.sender.send(message.clone()).is_ok() {
                    delivered += 1;
                } else {
                    failed.push(id.clone());
                }
            }
        }

        self.messages_sent
            .fetch_add(delivered as u64, Ordering::Relaxed);
        if !failed.is_empty() {
            self.errors.fetch_add(failed.len() as u64, Ordering::Relaxed);
            let mut registry = self.registry.write().await;
            for id in &failed {
                if let Some(session) = registry.sessions.get_mut(id) {
                    session.active = false;
                }
            }
        }
        delivered
    }

    // ---- counters ----

    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    // ---- introspection ----

    pub async fn session(&self, session_id: &str) -> Option<SessionInfo> {
        let registry = self.registry.read().await;
        registry
            .sessions
            .get(session_id)
            .map(|s| session_info(session_id, s))
    }

    /// Every live session, ordered by id.
    pub async fn sessions(&self) -> Vec<SessionInfo> {
        let registry = self.registry.read().await;
        let mut sessions: Vec<SessionInfo> = registry
            .sessions
            .iter()
            .map(|(id, s)| session_info(id, s))
            .collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        sessions
    }

    /// Room name to sorted member ids.
    pub async fn rooms(&self) -> BTreeMap<String, Vec<String>> {
        let registry = self.registry.read().await;
        registry
            .rooms
            .iter()
            .map(|(room, members)| {
                let mut members: Vec<String> = members.iter().cloned().collect();
                members.sort();
                (room.clone(), members)
            })
            .collect()
    }

    pub async fn stats(&self) -> WsStats {
        let registry = self.registry.read().await;
        WsStats {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            current_connections: registry.sessions.len(),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            active_sessions: registry.sessions.values().filter(|s| s.active).count(),
            rooms: registry.rooms.len(),
        }
    }

    /// Return the current number of registered sessions.
    pub async fn connection_count(&self) -> usize {
        self.registry.read().await.sessions.len()
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}

fn session_info(session_id: &str, session: &WsSession) -> SessionInfo {
    let mut rooms: Vec<String> = session.rooms.iter().cloned().collect();
    rooms.sort();
    let mut subscriptions: Vec<String> = session.subscriptions.iter().cloned().collect();
    subscriptions.sort();
    SessionInfo {
        session_id: session_id.to_string(),
        user_agent: session.user_agent.clone(),
        connected_at: session.connected_at,
        idle_secs: session.last_heartbeat.elapsed().as_secs_f64(),
        rooms,
        subscriptions,
        active: session.active,
    }
}
