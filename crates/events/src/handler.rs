//! Delivery callbacks registered per event name.

use std::sync::Arc;

use async_trait::async_trait;

use crate::message::Message;

/// A handler refused or failed to deliver a message. The bus retries it.
#[derive(Debug, thiserror::Error)]
#[error("Delivery rejected: {0}")]
pub struct DeliveryError(pub String);

impl DeliveryError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Receives every message published under the event it is registered for.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &Message) -> Result<(), DeliveryError>;
}

/// Adapter turning a synchronous closure into a [`MessageHandler`].
struct FnHandler<F>(F);

#[async_trait]
impl<F> MessageHandler for FnHandler<F>
where
    F: Fn(&Message) -> Result<(), DeliveryError> + Send + Sync,
{
    async fn handle(&self, message: &Message) -> Result<(), DeliveryError> {
        (self.0)(message)
    }
}

/// Wrap a closure as a shareable handler.
pub fn handler_fn<F>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(&Message) -> Result<(), DeliveryError> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}
