use chrono::{DateTime, Utc};
use notifier_models::core::NotificationRecord;
use sqlx::{Row, sqlite::SqliteRow};

use crate::StoreError;

pub const RECORD_COLUMNS: &str = "id, user_id, title, body, type, urgent, read, dismissed, due_date, intervals_sent, created_at";

pub fn row_to_record(row: &SqliteRow) -> Result<NotificationRecord, StoreError> {
    let id = row.try_get::<String, _>("id")?;

    let due_date = row
        .try_get::<Option<i64>, _>("due_date")?
        .map(|ms| millis_to_datetime(&id, ms))
        .transpose()?;
    let created_at = millis_to_datetime(&id, row.try_get::<i64, _>("created_at")?)?;
    let intervals_sent = serde_json::from_str(&row.try_get::<String, _>("intervals_sent")?)?;

    Ok(NotificationRecord {
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        body: row.try_get::<Option<String>, _>("body")?.unwrap_or_default(),
        kind: row.try_get("type")?,
        urgent: row.try_get("urgent")?,
        read: row.try_get("read")?,
        dismissed: row.try_get("dismissed")?,
        due_date,
        intervals_sent,
        created_at,
        id,
    })
}

fn millis_to_datetime(id: &str, ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Corrupt(format!("notification {id} has timestamp {ms} out of range")))
}
