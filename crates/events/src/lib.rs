//! Priority event bus with retrying dispatch.
//!
//! - [`EventBus`]: four priority FIFO queues drained by one dispatcher task,
//!   with a delay-queue retry task for rejected deliveries.
//! - [`Message`]: the event envelope (name, JSON payload, priority, target).
//! - [`MessageHandler`]: per-event delivery callback.

pub mod bus;
pub mod handler;
pub mod message;

pub use bus::{retry_delay, BusConfig, BusStats, EventBus, QueueDepths};
pub use handler::{handler_fn, DeliveryError, MessageHandler};
pub use message::{Message, Priority, Target};
