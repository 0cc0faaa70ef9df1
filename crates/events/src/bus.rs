//! In-process priority event bus.
//!
//! [`EventBus`] keeps one FIFO queue per [`Priority`]. A single dispatcher
//! task always drains the highest non-empty level first and hands each
//! message to the handler registered for its event name.
//!
//! A rejected (or panicking) delivery is re-queued by the retry task after
//! `min(2^retry_count, 30)` backoff units, until `max_retries` is reached;
//! then the message is dropped and counted as failed. Messages without a
//! handler are logged and counted as unhandled.
//!
//! The bus is created with [`EventBus::start`] and shared as `Arc<EventBus>`.

use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::time::DelayQueue;

use crate::handler::MessageHandler;
use crate::message::{Message, Priority, Target};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Bus tunables.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Length of one backoff unit.
    pub backoff_unit: Duration,
    /// Upper bound on the backoff, in units.
    pub max_backoff_units: u32,
    /// Delivered messages kept for [`EventBus::recent`].
    pub history_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            backoff_unit: Duration::from_secs(1),
            max_backoff_units: 30,
            history_capacity: 1000,
        }
    }
}

/// Delay before redelivering a message that has been retried
/// `retry_count` times: `min(2^retry_count, max_backoff_units)` units.
pub fn retry_delay(retry_count: u32, config: &BusConfig) -> Duration {
    let units = 2u32
        .checked_pow(retry_count)
        .unwrap_or(u32::MAX)
        .min(config.max_backoff_units);
    config.backoff_unit * units
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Queue depth per priority level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepths {
    pub critical: usize,
    pub high: usize,
    pub normal: usize,
    pub low: usize,
}

/// Snapshot returned by [`EventBus::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct BusStats {
    pub total: u64,
    pub processed: u64,
    pub failed: u64,
    pub retried: u64,
    pub unhandled: u64,
    pub queues: QueueDepths,
    pub pending_retries: usize,
    pub history_size: usize,
    pub handlers: usize,
}

#[derive(Default)]
struct Counters {
    total: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    unhandled: AtomicU64,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Priority publish/dispatch hub.
pub struct EventBus {
    /// Indexed by [`Priority::queue_index`].
    queues: Mutex<[VecDeque<Message>; 4]>,
    wakeup: Notify,
    handlers: RwLock<HashMap<String, Arc<dyn MessageHandler>>>,
    history: Mutex<VecDeque<Message>>,
    counters: Counters,
    pending_retries: AtomicUsize,
    retry_tx: mpsc::UnboundedSender<Message>,
    config: BusConfig,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl EventBus {
    /// Create the bus and spawn its dispatcher and retry tasks.
    pub fn start(config: BusConfig) -> Arc<Self> {
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();
        let bus = Arc::new(Self {
            queues: Mutex::new(Default::default()),
            wakeup: Notify::new(),
            handlers: RwLock::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            counters: Counters::default(),
            pending_retries: AtomicUsize::new(0),
            retry_tx,
            config,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        });

        let dispatcher = tokio::spawn(Arc::clone(&bus).run_dispatcher());
        let retrier = tokio::spawn(Arc::clone(&bus).run_retries(retry_rx));
        if let Ok(mut tasks) = bus.tasks.try_lock() {
            tasks.push(dispatcher);
            tasks.push(retrier);
        }

        tracing::info!("Event bus started");
        bus
    }

    // ---- publishing ----

    /// Enqueue a message built from parts. Returns its id.
    pub async fn publish(
        &self,
        event: &str,
        payload: serde_json::Value,
        priority: Priority,
        target: Target,
    ) -> String {
        let message = Message::new(event, payload)
            .with_priority(priority)
            .with_target(target);
        self.publish_message(message).await
    }

    /// Enqueue a pre-built message. Returns its id.
    pub async fn publish_message(&self, message: Message) -> String {
        let id = message.id.clone();
        tracing::trace!(
            message_id = %id,
            event = %message.event,
            priority = ?message.priority,
            "Message published",
        );
        self.counters.total.fetch_add(1, Ordering::Relaxed);
        self.enqueue(message).await;
        id
    }

    async fn enqueue(&self, message: Message) {
        let index = message.priority.queue_index();
        self.queues.lock().await[index].push_back(message);
        self.wakeup.notify_one();
    }

    // ---- handlers ----

    /// Register (or replace) the handler for `event`.
    pub async fn register_handler(&self, event: &str, handler: Arc<dyn MessageHandler>) {
        self.handlers.write().await.insert(event.to_string(), handler);
        tracing::debug!(event, "Handler registered");
    }

    /// Remove the handler for `event`. Returns whether one was registered.
    pub async fn unregister_handler(&self, event: &str) -> bool {
        let removed = self.handlers.write().await.remove(event).is_some();
        if removed {
            tracing::debug!(event, "Handler unregistered");
        }
        removed
    }

    // ---- introspection ----

    pub async fn stats(&self) -> BusStats {
        let queues = {
            let q = self.queues.lock().await;
            QueueDepths {
                critical: q[Priority::Critical.queue_index()].len(),
                high: q[Priority::High.queue_index()].len(),
                normal: q[Priority::Normal.queue_index()].len(),
                low: q[Priority::Low.queue_index()].len(),
            }
        };
        BusStats {
            total: self.counters.total.load(Ordering::Relaxed),
            processed: self.counters.processed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
            unhandled: self.counters.unhandled.load(Ordering::Relaxed),
            queues,
            pending_retries: self.pending_retries.load(Ordering::Relaxed),
            history_size: self.history.lock().await.len(),
            handlers: self.handlers.read().await.len(),
        }
    }

    /// Newest `count` delivered messages, oldest first.
    pub async fn recent(&self, count: usize) -> Vec<Message> {
        let history = self.history.lock().await;
        let skip = history.len().saturating_sub(count);
        history.iter().skip(skip).cloned().collect()
    }

    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    /// Stop the dispatcher and retry tasks. Queued messages are discarded.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down event bus");
        self.cancel.cancel();
        let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            let _ = tokio::time::timeout(Duration::from_secs(5), task).await;
        }
        tracing::info!("Event bus shut down complete");
    }

    // ---- dispatcher ----

    async fn pop_next(&self) -> Option<Message> {
        let mut queues = self.queues.lock().await;
        queues.iter_mut().find_map(|q| q.pop_front())
    }

    async fn run_dispatcher(self: Arc<Self>) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            if let Some(message) = self.pop_next().await {
                self.dispatch(message).await;
                continue;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.wakeup.notified() => {}
            }
        }
        tracing::info!("Event bus dispatcher stopped");
    }

    async fn dispatch(&self, message: Message) {
        let handler = self.handlers.read().await.get(&message.event).cloned();
        let Some(handler) = handler else {
            self.counters.unhandled.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                message_id = %message.id,
                event = %message.event,
                "No handler registered, message discarded",
            );
            return;
        };

        let outcome = AssertUnwindSafe(handler.handle(&message))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {
                self.counters.processed.fetch_add(1, Ordering::Relaxed);
                self.record(message).await;
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    message_id = %message.id,
                    event = %message.event,
                    retry_count = message.retry_count,
                    error = %e,
                    "Delivery rejected",
                );
                self.retry_or_drop(message);
            }
            Err(_) => {
                tracing::error!(
                    message_id = %message.id,
                    event = %message.event,
                    "Handler panicked",
                );
                self.retry_or_drop(message);
            }
        }
    }

    async fn record(&self, message: Message) {
        let mut history = self.history.lock().await;
        if history.len() >= self.config.history_capacity {
            history.pop_front();
        }
        if self.config.history_capacity > 0 {
            history.push_back(message);
        }
    }

    fn retry_or_drop(&self, mut message: Message) {
        if !message.can_retry() {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                message_id = %message.id,
                event = %message.event,
                retries = message.retry_count,
                "Message dropped after exhausting retries",
            );
            return;
        }

        message.retry_count += 1;
        self.counters.retried.fetch_add(1, Ordering::Relaxed);
        self.pending_retries.fetch_add(1, Ordering::Relaxed);
        if self.retry_tx.send(message).is_err() {
            // Retry task is gone (shutdown); nothing will redeliver it.
            self.pending_retries.fetch_sub(1, Ordering::Relaxed);
        }
    }

    // ---- retry task ----

    async fn run_retries(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<Message>) {
        let mut delayed: DelayQueue<Message> = DelayQueue::new();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                Some(message) = rx.recv() => {
                    let delay = retry_delay(message.retry_count, &self.config);
                    tracing::debug!(
                        message_id = %message.id,
                        retry_count = message.retry_count,
                        delay_ms = delay.as_millis() as u64,
                        "Retry scheduled",
                    );
                    delayed.insert(message, delay);
                }
                Some(expired) = delayed.next(), if !delayed.is_empty() => {
                    self.pending_retries.fetch_sub(1, Ordering::Relaxed);
                    self.enqueue(expired.into_inner()).await;
                }
            }
        }
        tracing::info!("Event bus retry task stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
