//! The [`Message`] envelope carried by the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of redeliveries after a rejected dispatch.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Dispatch priority. Ordering follows declaration: `Critical` is highest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    /// Levels in the order the dispatcher drains them.
    pub const DESCENDING: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];

    /// Position in [`Priority::DESCENDING`].
    pub(crate) fn queue_index(self) -> usize {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// Who should receive a message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Target {
    /// Every connected session.
    #[default]
    Broadcast,
    /// Only the listed sessions.
    Sessions(Vec<String>),
    /// Every member of a room.
    Room(String),
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One published event.
///
/// Built with [`Message::new`] and the `with_*`/`for_*` builder methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// UUID v4.
    pub id: String,
    pub event: String,
    pub payload: serde_json::Value,
    pub priority: Priority,
    pub target: Target,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl Message {
    /// Normal-priority broadcast message.
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event: event.into(),
            payload,
            priority: Priority::Normal,
            target: Target::Broadcast,
            created_at: Utc::now(),
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Address specific sessions.
    pub fn for_sessions<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_target(Target::Sessions(ids.into_iter().map(Into::into).collect()))
    }

    /// Address every member of `room`.
    pub fn for_room(self, room: impl Into<String>) -> Self {
        self.with_target(Target::Room(room.into()))
    }

    /// Whether another redelivery is allowed.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}
