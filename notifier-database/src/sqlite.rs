use std::{str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use notifier_models::core::{NotificationRecord, retention};
use sqlx::{
    ConnectOptions, Executor, SqlitePool,
    sqlite::SqliteConnectOptions,
};

use crate::{
    StoreError, interfaces::NotificationStore, mappers::{self, RECORD_COLUMNS}, validate_record,
};

// SQLite extended result codes for PRIMARY KEY and UNIQUE violations.
const CONSTRAINT_PRIMARYKEY: &str = "1555";
const CONSTRAINT_UNIQUE: &str = "2067";

pub struct SqliteStore {
    pub pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database named by a `sqlite://` URI.
    pub async fn connect(uri: &str) -> Result<Self, StoreError> {
        let mut options = SqliteConnectOptions::from_str(uri)?.create_if_missing(true);
        options
            .log_statements(log::LevelFilter::Debug)
            .log_slow_statements(log::LevelFilter::Warn, Duration::from_secs(1));
        let pool = SqlitePool::connect_with(options).await?;
        Ok(SqliteStore { pool })
    }
}

impl NotificationStore for SqliteStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        self.pool
            .execute(
                "CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY NOT NULL,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT,
                type TEXT NOT NULL DEFAULT 'default',
                urgent BOOLEAN NOT NULL DEFAULT 0,
                read BOOLEAN NOT NULL DEFAULT 0,
                dismissed BOOLEAN NOT NULL DEFAULT 0,
                due_date INTEGER,
                intervals_sent TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL
            )",
            )
            .await?;
        self.pool
            .execute("CREATE INDEX IF NOT EXISTS idx_notifications_user_id ON notifications (user_id)")
            .await?;
        self.pool
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_notifications_user_created
                 ON notifications (user_id, created_at DESC)",
            )
            .await?;
        Ok(())
    }

    async fn find_existing(
        &self,
        user_id: &str,
        title: &str,
    ) -> Result<Option<NotificationRecord>, StoreError> {
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM notifications WHERE user_id = ? AND title = ? LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(user_id)
            .bind(title)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(mappers::row_to_record).transpose()
    }

    async fn save(&self, record: &NotificationRecord) -> Result<(), StoreError> {
        validate_record(record)?;
        let intervals_sent = serde_json::to_string(&record.intervals_sent)?;

        let query = format!(
            "INSERT INTO notifications ({RECORD_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        self.pool
            .execute(
                sqlx::query(&query)
                    .bind(&record.id)
                    .bind(&record.user_id)
                    .bind(&record.title)
                    .bind(&record.body)
                    .bind(&record.kind)
                    .bind(record.urgent)
                    .bind(record.read)
                    .bind(record.dismissed)
                    .bind(record.due_date.map(|dt| dt.timestamp_millis()))
                    .bind(intervals_sent)
                    .bind(record.created_at.timestamp_millis()),
            )
            .await
            .map_err(|err| insert_error(err, &record.id))?;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let cutoff = (now - retention()).timestamp_millis();
        let result = self
            .pool
            .execute(sqlx::query("DELETE FROM notifications WHERE created_at <= ?").bind(cutoff))
            .await?;
        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn insert_error(err: sqlx::Error, id: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if matches!(
            db_err.code().as_deref(),
            Some(CONSTRAINT_PRIMARYKEY) | Some(CONSTRAINT_UNIQUE)
        ) {
            return StoreError::Duplicate(id.to_string());
        }
    }
    StoreError::Backend(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use notifier_models::core::Notification;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> SqliteStore {
        let uri = format!("sqlite://{}", dir.path().join("notifications.db").display());
        let store = SqliteStore::connect(&uri).await.unwrap();
        store.initialize().await.unwrap();
        store
    }

    fn record(id: &str, user_id: &str, title: &str, created_at: DateTime<Utc>) -> NotificationRecord {
        let notification = Notification {
            id: id.into(),
            user_id: user_id.into(),
            title: title.into(),
            body: None,
            kind: None,
            urgent: None,
            timestamp: Some(created_at),
        };
        NotificationRecord::from_notification(&notification, created_at)
    }

    #[tokio::test]
    async fn saves_and_finds_by_user_and_title() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let created = Utc.with_ymd_and_hms(2024, 3, 10, 9, 15, 0).unwrap();
        let mut saved = record("n-1", "user-1", "Build finished", created);
        saved.intervals_sent = vec![5, 15];

        store.save(&saved).await.unwrap();

        let found = store
            .find_existing("user-1", "Build finished")
            .await
            .unwrap()
            .expect("record should exist");
        assert_eq!(found, saved);
        assert!(store.find_existing("user-1", "Other").await.unwrap().is_none());
        assert!(store.find_existing("user-2", "Build finished").await.unwrap().is_none());
        store.close().await;
    }

    #[tokio::test]
    async fn rejects_reused_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let now = Utc::now();

        store.save(&record("n-1", "user-1", "First", now)).await.unwrap();
        let err = store
            .save(&record("n-1", "user-2", "Second", now))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Duplicate(id) if id == "n-1"));
    }

    #[tokio::test]
    async fn rejects_missing_required_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let err = store
            .save(&record("", "user-1", "Title", Utc::now()))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn purge_removes_only_expired_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        store
            .save(&record("old", "user-1", "Old", now - ChronoDuration::days(31)))
            .await
            .unwrap();
        store
            .save(&record("fresh", "user-1", "Fresh", now - ChronoDuration::days(2)))
            .await
            .unwrap();

        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert!(store.find_existing("user-1", "Old").await.unwrap().is_none());
        assert!(store.find_existing("user-1", "Fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.initialize().await.unwrap();
    }
}
