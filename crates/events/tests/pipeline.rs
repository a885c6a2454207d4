//! End-to-end notification pipeline across simulated server processes that
//! share one bus and one notification store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use rescue_core::notification::{NotificationEvent, NotificationProperty, NotificationType};
use rescue_db::models::notification::{CreateNotification, Notification};
use rescue_events::{
    BusError, BusMessage, MemoryBusHub, MemoryMessageBus, MemoryNotificationStore, MessageBus,
    NotificationProducer, NotificationRelay, NotificationStore, PublishOutcome, PushConfig,
    PushConnectionRegistry, PushSession,
};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Bus wrapper counting publish calls.
struct CountingBus {
    inner: MemoryMessageBus,
    published: AtomicUsize,
}

#[async_trait]
impl MessageBus for CountingBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
        self.published.fetch_add(1, Ordering::SeqCst);
        self.inner.publish(channel, payload).await
    }

    async fn subscribe(&self, channel: &str) -> Result<(), BusError> {
        self.inner.subscribe(channel).await
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BusError> {
        self.inner.unsubscribe(channel).await
    }

    fn messages(&self) -> broadcast::Receiver<BusMessage> {
        self.inner.messages()
    }
}

/// Bus whose publish always fails.
struct BrokenBus(MemoryMessageBus);

#[async_trait]
impl MessageBus for BrokenBus {
    async fn publish(&self, _channel: &str, _payload: &str) -> Result<(), BusError> {
        Err(BusError::Closed)
    }

    async fn subscribe(&self, channel: &str) -> Result<(), BusError> {
        self.0.subscribe(channel).await
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BusError> {
        self.0.unsubscribe(channel).await
    }

    fn messages(&self) -> broadcast::Receiver<BusMessage> {
        self.0.messages()
    }
}

/// One simulated server process.
struct Process {
    bus: Arc<CountingBus>,
    relay: Arc<NotificationRelay>,
    producer: NotificationProducer,
}

impl Process {
    fn start(hub: &MemoryBusHub, store: &MemoryNotificationStore) -> Self {
        let bus = Arc::new(CountingBus {
            inner: hub.connect(),
            published: AtomicUsize::new(0),
        });
        let relay = Arc::new(NotificationRelay::new(
            bus.clone(),
            Arc::new(PushConnectionRegistry::new()),
        ));
        tokio::spawn(Arc::clone(&relay).run(bus.messages()));
        let producer = NotificationProducer::new(Arc::new(store.clone()), Arc::clone(&relay));
        Self {
            bus,
            relay,
            producer,
        }
    }

    fn published(&self) -> usize {
        self.bus.published.load(Ordering::SeqCst)
    }
}

fn milk() -> NotificationProperty {
    NotificationProperty::new("Milk expires tomorrow").with_origin(7)
}

fn candidate(recipient: &str, property: NotificationProperty) -> CreateNotification {
    CreateNotification {
        recipient: recipient.to_string(),
        notification_type: NotificationType::IngredientExpired,
        notification_property: property,
    }
}

async fn next_notification(session: &mut PushSession) -> Notification {
    let frame = tokio::time::timeout(Duration::from_secs(5), session.next_frame())
        .await
        .expect("frame should arrive")
        .expect("session should be open");
    serde_json::from_str(&frame.data).expect("frame carries a notification")
}

// ---------------------------------------------------------------------------
// Dedup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn same_notification_twice_is_stored_and_sent_once() {
    let hub = MemoryBusHub::new();
    let store = MemoryNotificationStore::new();
    let process = Process::start(&hub, &store);

    let first = process
        .producer
        .publish("u1", NotificationType::IngredientExpired, milk())
        .await
        .unwrap();
    let second = process
        .producer
        .publish("u1", NotificationType::IngredientExpired, milk())
        .await
        .unwrap();

    assert_matches!(first, PublishOutcome::Published(_));
    assert_eq!(second, PublishOutcome::Duplicate);
    assert_eq!(store.count_matching(&candidate("u1", milk())), 1);
    assert_eq!(process.published(), 1);
}

#[tokio::test]
async fn distinct_properties_are_stored_and_sent_separately() {
    let hub = MemoryBusHub::new();
    let store = MemoryNotificationStore::new();
    let process = Process::start(&hub, &store);

    let eggs = NotificationProperty::new("Eggs expire tomorrow").with_origin(8);
    process
        .producer
        .publish("u1", NotificationType::IngredientExpired, milk())
        .await
        .unwrap();
    process
        .producer
        .publish("u1", NotificationType::IngredientExpired, eggs)
        .await
        .unwrap();

    assert_eq!(store.len(), 2);
    assert_eq!(process.published(), 2);
}

#[tokio::test]
async fn tight_duplicate_race_stores_at_most_two() {
    let hub = MemoryBusHub::new();
    let store = MemoryNotificationStore::new();
    let process_a = Process::start(&hub, &store);
    let process_b = Process::start(&hub, &store);

    // The in-memory store has no uniqueness constraint, so both checks may
    // pass before either insert lands. Postgres closes this gap with its
    // unique index.
    let (a, b) = tokio::join!(
        process_a
            .producer
            .publish("u1", NotificationType::IngredientExpired, milk()),
        process_b
            .producer
            .publish("u1", NotificationType::IngredientExpired, milk()),
    );
    a.unwrap();
    b.unwrap();

    let stored = store.count_matching(&candidate("u1", milk()));
    assert!((1..=2).contains(&stored), "stored {stored} rows");
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn notification_reaches_connection_on_another_process() {
    let hub = MemoryBusHub::new();
    let store = MemoryNotificationStore::new();
    let producing = Process::start(&hub, &store);
    let holding = Process::start(&hub, &store);

    let mut session = PushSession::open(holding.relay.clone(), "u1", PushConfig::default())
        .await
        .unwrap();
    let handshake = session.next_frame().await.unwrap();
    assert_eq!(handshake.data, "EventStream Created. [userEmail=u1]");

    let outcome = producing
        .producer
        .publish("u1", NotificationType::IngredientExpired, milk())
        .await
        .unwrap();
    let PublishOutcome::Published(stored) = outcome else {
        panic!("expected a new notification");
    };

    let pushed = next_notification(&mut session).await;
    assert_eq!(pushed, stored);

    session.close().await;
}

#[tokio::test]
async fn publish_event_delivers_without_waiting() {
    let hub = MemoryBusHub::new();
    let store = MemoryNotificationStore::new();
    let process = Process::start(&hub, &store);

    let mut session = PushSession::open(process.relay.clone(), "u1", PushConfig::default())
        .await
        .unwrap();
    session.next_frame().await.unwrap();

    let handle = process.producer.publish_event(NotificationEvent::new(
        "u1",
        NotificationType::RecipeReviewed,
        NotificationProperty::new("fan left a review on Kimchi stew").with_origin(3),
    ));

    let pushed = next_notification(&mut session).await;
    assert_eq!(pushed.notification_type, NotificationType::RecipeReviewed);
    assert_eq!(pushed.notification_property.origin_id, Some(3));
    handle.await.unwrap();
}

#[tokio::test]
async fn delivery_without_connection_keeps_row_readable() {
    let hub = MemoryBusHub::new();
    let store = MemoryNotificationStore::new();
    let process = Process::start(&hub, &store);

    let outcome = process
        .producer
        .publish("offline", NotificationType::RecipeRecommended, milk())
        .await
        .unwrap();
    let PublishOutcome::Published(stored) = outcome else {
        panic!("expected a new notification");
    };

    let rows = store.find_by_recipient("offline", 20, 0).await.unwrap();
    assert_eq!(rows, vec![stored.clone()]);
    assert_eq!(store.find_by_id(stored.id).await.unwrap(), Some(stored));
}

#[tokio::test]
async fn bus_failure_does_not_fail_the_producer() {
    let hub = MemoryBusHub::new();
    let store = MemoryNotificationStore::new();
    let relay = Arc::new(NotificationRelay::new(
        Arc::new(BrokenBus(hub.connect())),
        Arc::new(PushConnectionRegistry::new()),
    ));
    let producer = NotificationProducer::new(Arc::new(store.clone()), relay);

    let outcome = producer
        .publish("u1", NotificationType::IngredientExpired, milk())
        .await
        .unwrap();

    assert_matches!(outcome, PublishOutcome::Published(_));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn store_failure_is_reported() {
    let hub = MemoryBusHub::new();
    let store = MemoryNotificationStore::new();
    let process = Process::start(&hub, &store);
    store.set_unavailable(true);

    let result = process
        .producer
        .publish("u1", NotificationType::IngredientExpired, milk())
        .await;

    assert!(result.is_err());
    assert_eq!(process.published(), 0);
}

// ---------------------------------------------------------------------------
// Subscription hygiene
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subscribe_then_unsubscribe_leaves_no_trace() {
    let hub = MemoryBusHub::new();
    let store = MemoryNotificationStore::new();
    let process = Process::start(&hub, &store);

    let baseline_bus = hub.subscription_count();
    let baseline_registry = process.relay.registry().connection_count().await;

    let session = PushSession::open(process.relay.clone(), "u1", PushConfig::default())
        .await
        .unwrap();
    session.close().await;

    assert_eq!(hub.subscription_count(), baseline_bus);
    assert_eq!(
        process.relay.registry().connection_count().await,
        baseline_registry
    );
    assert_eq!(process.relay.subscription_count().await, 0);
}

#[tokio::test]
async fn close_all_runs_every_session_cleanup() {
    let hub = MemoryBusHub::new();
    let store = MemoryNotificationStore::new();
    let process = Process::start(&hub, &store);

    let mut sessions = Vec::new();
    for recipient in ["u1", "u2", "u3"] {
        sessions.push(
            PushSession::open(process.relay.clone(), recipient, PushConfig::default())
                .await
                .unwrap(),
        );
    }
    assert_eq!(process.relay.registry().close_all().await, 3);

    for mut session in sessions {
        while session.next_frame().await.is_some() {}
    }
    assert_eq!(process.relay.registry().connection_count().await, 0);
    assert_eq!(hub.subscription_count(), 0);
}
