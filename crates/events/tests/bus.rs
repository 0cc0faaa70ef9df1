//! Integration tests for `EventBus` dispatch order and retry accounting.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use buildcast_events::{
    handler_fn, BusConfig, DeliveryError, EventBus, Message, MessageHandler, Priority, Target,
};
use tokio::sync::Notify;

fn fast_config() -> BusConfig {
    BusConfig {
        backoff_unit: Duration::from_millis(5),
        ..BusConfig::default()
    }
}

/// Records the `payload["n"]` of every delivered message.
fn recorder(log: Arc<Mutex<Vec<String>>>) -> Arc<dyn MessageHandler> {
    handler_fn(move |msg| {
        let n = msg.payload["n"].as_str().unwrap_or_default().to_string();
        log.lock().expect("log lock").push(n);
        Ok(())
    })
}

/// Blocks the dispatcher until released.
struct Gate {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl MessageHandler for Gate {
    async fn handle(&self, _message: &Message) -> Result<(), DeliveryError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

// ---------------------------------------------------------------------------
// Test: higher priorities overtake lower ones queued while busy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn critical_overtakes_queued_lower_priorities() {
    let bus = EventBus::start(fast_config());
    let gate = Arc::new(Gate {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let log = Arc::new(Mutex::new(Vec::new()));

    bus.register_handler("gate", gate.clone()).await;
    bus.register_handler("work", recorder(log.clone())).await;

    bus.publish("gate", serde_json::Value::Null, Priority::Low, Target::Broadcast)
        .await;
    gate.entered.notified().await;

    for (n, priority) in [
        ("low", Priority::Low),
        ("critical", Priority::Critical),
        ("normal", Priority::Normal),
    ] {
        bus.publish("work", serde_json::json!({ "n": n }), priority, Target::Broadcast)
            .await;
    }
    gate.release.notify_one();

    let log_view = log.clone();
    wait_until(move || log_view.lock().expect("log lock").len() == 3).await;
    assert_eq!(
        *log.lock().expect("log lock"),
        vec!["critical", "normal", "low"]
    );
    bus.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: FIFO within one priority level
// ---------------------------------------------------------------------------

#[tokio::test]
async fn same_priority_is_fifo() {
    let bus = EventBus::start(fast_config());
    let log = Arc::new(Mutex::new(Vec::new()));
    bus.register_handler("work", recorder(log.clone())).await;

    for i in 0..20 {
        let n = i.to_string();
        bus.publish_message(
            Message::new("work", serde_json::json!({ "n": n })).with_priority(Priority::High),
        )
        .await;
    }

    let log_view = log.clone();
    wait_until(move || log_view.lock().expect("log lock").len() == 20).await;
    let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
    assert_eq!(*log.lock().expect("log lock"), expected);

    let stats = bus.stats().await;
    assert_eq!(stats.total, 20);
    assert_eq!(stats.processed, 20);
    assert_eq!(stats.history_size, 20);
    assert_eq!(bus.recent(2).await.len(), 2);

    bus.clear_history().await;
    assert_eq!(bus.stats().await.history_size, 0);
    bus.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: always-rejecting handler is retried exactly max_retries times
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejecting_handler_exhausts_retries_once() {
    let bus = EventBus::start(fast_config());
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    bus.register_handler(
        "flaky",
        handler_fn(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DeliveryError::new("client unavailable"))
        }),
    )
    .await;

    bus.publish_message(Message::new("flaky", serde_json::Value::Null).with_max_retries(3))
        .await;

    tokio::time::timeout(Duration::from_secs(5), async {
        while bus.stats().await.failed == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("message never failed");

    // Give a stray redelivery the chance to show up.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stats = bus.stats().await;
    assert_eq!(stats.retried, 3);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.processed, 0);
    assert_eq!(stats.pending_retries, 0);
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
    bus.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: a handler that succeeds on redelivery is processed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn retry_succeeds_after_transient_rejection() {
    let bus = EventBus::start(fast_config());
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    bus.register_handler(
        "transient",
        handler_fn(move |msg| {
            counter.fetch_add(1, Ordering::SeqCst);
            if msg.retry_count == 0 {
                Err(DeliveryError::new("not yet"))
            } else {
                Ok(())
            }
        }),
    )
    .await;

    bus.publish("transient", serde_json::Value::Null, Priority::Normal, Target::Broadcast)
        .await;

    tokio::time::timeout(Duration::from_secs(5), async {
        while bus.stats().await.processed == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("message never processed");

    let stats = bus.stats().await;
    assert_eq!(stats.retried, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(bus.recent(1).await[0].retry_count, 1);
    bus.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: panicking handler goes through the retry path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn panicking_handler_is_retried_then_failed() {
    let bus = EventBus::start(fast_config());
    bus.register_handler("boom", handler_fn(|_| panic!("handler bug")))
        .await;

    bus.publish_message(Message::new("boom", serde_json::Value::Null).with_max_retries(1))
        .await;

    tokio::time::timeout(Duration::from_secs(5), async {
        while bus.stats().await.failed == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("message never failed");

    let stats = bus.stats().await;
    assert_eq!(stats.retried, 1);
    assert_eq!(stats.failed, 1);
    bus.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: messages without a handler are discarded, not retried
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unhandled_messages_are_counted() {
    let bus = EventBus::start(fast_config());
    let log = Arc::new(Mutex::new(Vec::new()));
    bus.register_handler("work", recorder(log.clone())).await;
    assert!(bus.unregister_handler("work").await);
    assert!(!bus.unregister_handler("work").await);

    bus.publish("work", serde_json::json!({"n": "x"}), Priority::High, Target::Broadcast)
        .await;

    tokio::time::timeout(Duration::from_secs(5), async {
        while bus.stats().await.unhandled == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("message never discarded");

    let stats = bus.stats().await;
    assert_eq!(stats.retried, 0);
    assert_eq!(stats.failed, 0);
    assert!(log.lock().expect("log lock").is_empty());
    bus.shutdown().await;
}
