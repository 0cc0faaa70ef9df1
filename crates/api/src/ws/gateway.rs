//! Bridge from the event bus to connected WebSocket sessions.

use std::sync::Arc;

use async_trait::async_trait;
use buildcast_core::job_events::{
    EVENT_COMPILE_COMPLETED, EVENT_COMPILE_COMPLETE_ALIAS, EVENT_COMPILE_ERROR_ALIAS,
    EVENT_COMPILE_FAILED, GATEWAY_EVENTS,
};
use buildcast_events::{DeliveryError, EventBus, Message, MessageHandler, Target};

use crate::ws::manager::WsManager;

/// Short names still sent alongside the canonical terminal events.
fn alias_of(event: &str) -> Option<&'static str> {
    match event {
        EVENT_COMPILE_COMPLETED => Some(EVENT_COMPILE_COMPLETE_ALIAS),
        EVENT_COMPILE_FAILED => Some(EVENT_COMPILE_ERROR_ALIAS),
        _ => None,
    }
}

/// Delivers bus messages to sessions according to their [`Target`].
pub struct GatewayHandler {
    ws_manager: Arc<WsManager>,
}

impl GatewayHandler {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    async fn deliver(&self, event: &str, message: &Message) -> Result<usize, DeliveryError> {
        let data = &message.payload;
        match &message.target {
            Target::Broadcast => Ok(self.ws_manager.broadcast_event(event, data).await),
            Target::Room(room) => Ok(self.ws_manager.send_to_room(room, event, data).await),
            Target::Sessions(ids) => {
                let sent = self.ws_manager.send_to_sessions(ids, event, data).await;
                if sent == 0 && !ids.is_empty() {
                    return Err(DeliveryError::new(format!(
                        "none of {} target sessions reachable",
                        ids.len()
                    )));
                }
                Ok(sent)
            }
        }
    }
}

#[async_trait]
impl MessageHandler for GatewayHandler {
    async fn handle(&self, message: &Message) -> Result<(), DeliveryError> {
        let sent = self.deliver(&message.event, message).await?;
        if let Some(alias) = alias_of(&message.event) {
            if let Err(e) = self.deliver(alias, message).await {
                tracing::debug!(event = alias, error = %e, "Alias delivery skipped");
            }
        }
        tracing::trace!(
            event = %message.event,
            message_id = %message.id,
            sent,
            "Delivered event to WebSocket sessions",
        );
        Ok(())
    }
}

/// Register one [`GatewayHandler`] for every client-facing event name.
pub async fn register_gateway(bus: &EventBus, ws_manager: Arc<WsManager>) {
    let handler: Arc<dyn MessageHandler> = Arc::new(GatewayHandler::new(ws_manager));
    for event in GATEWAY_EVENTS {
        bus.register_handler(event, Arc::clone(&handler)).await;
    }
    tracing::info!(events = GATEWAY_EVENTS.len(), "WebSocket gateway registered on event bus");
}
