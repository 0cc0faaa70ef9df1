use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::ws::manager::WsManager;

/// Spawn a background task that, every `interval`, evicts sessions silent
/// for longer than `timeout`, removes sessions whose last send failed, and
/// sends Ping frames to the rest.
///
/// The task runs until `cancel` is triggered.
pub fn start_heartbeat(
    ws_manager: Arc<WsManager>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let evicted = ws_manager.evict_stale(timeout).await;
            if !evicted.is_empty() {
                tracing::info!(count = evicted.len(), "Evicted stale WebSocket sessions");
            }
            ws_manager.cleanup_inactive(timeout).await;

            let count = ws_manager.connection_count().await;
            tracing::debug!(count, "WebSocket heartbeat ping");
            ws_manager.ping_all().await;
        }

        tracing::debug!("WebSocket heartbeat stopped");
    })
}
