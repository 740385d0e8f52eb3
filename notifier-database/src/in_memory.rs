use std::sync::Arc;

use chrono::{DateTime, Utc};
use notifier_models::core::NotificationRecord;
use parking_lot::Mutex;

use crate::{StoreError, interfaces::NotificationStore, validate_record};

/// Process-local store with the same validation and uniqueness rules as the SQLite store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    records: Arc<Mutex<Vec<NotificationRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<NotificationRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl NotificationStore for InMemoryStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_existing(
        &self,
        user_id: &str,
        title: &str,
    ) -> Result<Option<NotificationRecord>, StoreError> {
        let guard = self.records.lock();
        Ok(guard
            .iter()
            .find(|record| record.user_id == user_id && record.title == title)
            .cloned())
    }

    async fn save(&self, record: &NotificationRecord) -> Result<(), StoreError> {
        validate_record(record)?;
        let mut guard = self.records.lock();
        if guard.iter().any(|existing| existing.id == record.id) {
            return Err(StoreError::Duplicate(record.id.clone()));
        }
        guard.push(record.clone());
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut guard = self.records.lock();
        let before = guard.len();
        guard.retain(|record| !record.is_expired(now));
        Ok((before - guard.len()) as u64)
    }

    async fn close(&self) {}
}
