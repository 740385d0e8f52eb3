use std::sync::Arc;

use chrono::Utc;
use log::{error, info};
use notifier_api::RealtimeNotifier;
use notifier_database::{StoreError, interfaces::NotificationStore};
use notifier_models::core::{Notification, NotificationRecord};
use thiserror::Error;

/// What happened to a notification that made it through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A record for the same user and title already exists; nothing was written or forwarded.
    Duplicate,
    /// Stored durably. `forwarded` reports whether real-time delivery also succeeded.
    Persisted { forwarded: bool },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("duplicate lookup failed for notification {id}: {source}")]
    Lookup {
        id: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to persist notification {id}: {source}")]
    Persist {
        id: String,
        #[source]
        source: StoreError,
    },
}

/// Dedupe, persist, then forward a single decoded notification.
pub struct Pipeline<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
}

impl<S, N> Pipeline<S, N>
where
    S: NotificationStore,
    N: RealtimeNotifier,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        Self { store, notifier }
    }

    /// Only store failures are returned; they decide whether the message is retried.
    pub async fn process(&self, notification: &Notification) -> Result<ProcessOutcome, PipelineError> {
        let existing = self
            .store
            .find_existing(&notification.user_id, &notification.title)
            .await
            .map_err(|source| PipelineError::Lookup {
                id: notification.id.clone(),
                source,
            })?;
        if existing.is_some() {
            info!("Notification already exists in store: {}", notification.id);
            return Ok(ProcessOutcome::Duplicate);
        }

        let record = NotificationRecord::from_notification(notification, Utc::now());
        self.store
            .save(&record)
            .await
            .map_err(|source| PipelineError::Persist {
                id: notification.id.clone(),
                source,
            })?;
        info!("Notification saved to store: {}", notification.id);

        // Past this point the notification is durable; a failed forward must not trigger a retry.
        let forwarded = self.forward(notification).await;
        Ok(ProcessOutcome::Persisted {
            forwarded: forwarded.is_ok(),
        })
    }

    async fn forward(&self, notification: &Notification) -> notifier_api::Result<()> {
        let result = self.notifier.deliver(notification).await;
        match &result {
            Ok(()) => info!(
                "Real-time service notified for notification: {}",
                notification.id
            ),
            Err(err) => error!(
                "Failed to notify real-time service for user {} (notification {}): {}",
                notification.user_id, notification.id, err
            ),
        }
        result
    }
}
