use std::future::Future;

use chrono::{DateTime, Utc};
use notifier_models::core::NotificationRecord;

use crate::StoreError;

// Implementors are shared behind an Arc across tasks, so they must own their state.
pub trait NotificationStore: Send + Sync + 'static {
    /// Create the notifications table and its indexes if they are missing.
    fn initialize(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// First record for the user with exactly this title, if any.
    fn find_existing(
        &self,
        user_id: &str,
        title: &str,
    ) -> impl Future<Output = Result<Option<NotificationRecord>, StoreError>> + Send;

    /// Insert a new record. Fails on empty required fields or a reused id.
    fn save(&self, record: &NotificationRecord) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete records past their retention window and return how many went away.
    fn purge_expired(&self, now: DateTime<Utc>) -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn close(&self) -> impl Future<Output = ()> + Send;
}
