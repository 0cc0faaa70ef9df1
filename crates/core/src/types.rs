/// Jobs, processes, messages and client sessions are all keyed by string ids.
pub type EntityId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
