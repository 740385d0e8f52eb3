use std::{sync::Arc, time::Duration};

use chrono::Utc;
use log::{debug, error, info};
use notifier_database::{StoreError, interfaces::NotificationStore};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Periodically delete notifications whose retention window has passed.
pub fn spawn_retention_sweeper<S: NotificationStore>(
    store: Arc<S>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = sweep(store.as_ref()).await {
                        error!("Retention sweep failed: {}", err);
                    }
                }
            }
        }
        debug!("Retention sweeper stopped");
    })
}

/// One pass over the store; returns how many records were purged.
pub async fn sweep<S: NotificationStore>(store: &S) -> Result<u64, StoreError> {
    let purged = store.purge_expired(Utc::now()).await?;
    if purged > 0 {
        info!("Purged {} expired notification(s)", purged);
    }
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use notifier_database::in_memory::InMemoryStore;
    use notifier_models::core::NotificationRecord;

    use crate::testing::notification;

    fn record(id: &str, age_days: i64) -> NotificationRecord {
        let mut notification = notification(id, "user-1", id);
        notification.timestamp = Some(Utc::now() - ChronoDuration::days(age_days));
        NotificationRecord::from_notification(&notification, Utc::now())
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_records() {
        let store = InMemoryStore::new();
        store.save(&record("old", 31)).await.unwrap();
        store.save(&record("fresh", 2)).await.unwrap();

        assert_eq!(sweep(&store).await.unwrap(), 1);

        let remaining: Vec<String> = store.records().into_iter().map(|r| r.id).collect();
        assert_eq!(remaining, vec!["fresh".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_runs_on_its_interval_until_cancelled() {
        let store = Arc::new(InMemoryStore::new());
        let cancel = CancellationToken::new();
        let sweeper = spawn_retention_sweeper(
            Arc::clone(&store),
            Duration::from_secs(60),
            cancel.clone(),
        );

        // The first tick fires immediately; this record only shows up for the second one.
        tokio::time::sleep(Duration::from_secs(1)).await;
        store.save(&record("old", 45)).await.unwrap();
        assert_eq!(store.len(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(store.is_empty());

        cancel.cancel();
        sweeper.await.unwrap();
    }
}
