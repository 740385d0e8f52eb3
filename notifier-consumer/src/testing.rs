//! Instrumented collaborators shared by the pipeline and manager tests.

use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notifier_api::{ApiError, RealtimeNotifier};
use notifier_broker::in_memory::InMemoryBroker;
use notifier_database::{StoreError, in_memory::InMemoryStore, interfaces::NotificationStore};
use notifier_models::core::{Notification, NotificationRecord};
use serde_json::json;

pub fn notification(id: &str, user_id: &str, title: &str) -> Notification {
    Notification {
        id: id.into(),
        user_id: user_id.into(),
        title: title.into(),
        body: None,
        kind: None,
        urgent: None,
        timestamp: None,
    }
}

pub fn payload(id: &str, user_id: &str, title: &str) -> Vec<u8> {
    json!({ "id": id, "userId": user_id, "title": title })
        .to_string()
        .into_bytes()
}

/// Tracks how many instrumented calls are running at once.
#[derive(Default)]
pub struct ConcurrencyProbe {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyProbe {
    pub async fn observe(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        // Give any concurrent caller a chance to overlap with us.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// In-memory store with injectable save failures and call accounting.
#[derive(Default)]
pub struct TestStore {
    inner: InMemoryStore,
    failing_saves: AtomicUsize,
    lookups: AtomicUsize,
    pub probe: ConcurrencyProbe,
}

impl TestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_saves(&self, count: usize) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<NotificationRecord> {
        self.inner.records()
    }
}

impl NotificationStore for TestStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        self.inner.initialize().await
    }

    async fn find_existing(
        &self,
        user_id: &str,
        title: &str,
    ) -> Result<Option<NotificationRecord>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.probe.observe().await;
        self.inner.find_existing(user_id, title).await
    }

    async fn save(&self, record: &NotificationRecord) -> Result<(), StoreError> {
        self.probe.observe().await;
        let remaining = self.failing_saves.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_saves.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Backend(sqlx::Error::PoolTimedOut));
        }
        self.inner.save(record).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.inner.purge_expired(now).await
    }

    async fn close(&self) {}
}

/// Records every delivery attempt; optionally fails all of them.
#[derive(Default)]
pub struct TestNotifier {
    fail: AtomicBool,
    attempts: AtomicUsize,
    delivered: Mutex<Vec<Notification>>,
}

impl TestNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.fail.store(true, Ordering::SeqCst);
        notifier
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered_ids(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|notification| notification.id.clone())
            .collect()
    }
}

#[async_trait]
impl RealtimeNotifier for TestNotifier {
    async fn deliver(&self, notification: &Notification) -> notifier_api::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ApiError::InvalidUrl {
                url: "http://".into(),
                source: url::ParseError::EmptyHost,
            });
        }
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Drops every broker connection during its first delivery, then records like [`TestNotifier`].
pub struct SeveringNotifier {
    broker: InMemoryBroker,
    severed: AtomicBool,
    pub inner: TestNotifier,
}

impl SeveringNotifier {
    pub fn new(broker: InMemoryBroker) -> Self {
        Self {
            broker,
            severed: AtomicBool::new(false),
            inner: TestNotifier::new(),
        }
    }
}

#[async_trait]
impl RealtimeNotifier for SeveringNotifier {
    async fn deliver(&self, notification: &Notification) -> notifier_api::Result<()> {
        if !self.severed.swap(true, Ordering::SeqCst) {
            self.broker.sever_connections();
        }
        self.inner.deliver(notification).await
    }
}
