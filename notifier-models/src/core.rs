use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Kind assigned to notifications that do not name one.
pub const DEFAULT_KIND: &str = "default";

/// Records expire this many seconds after `created_at` (30 days).
pub const RETENTION_SECONDS: i64 = 2_592_000;

/// Notification as published by upstream producers.
///
/// Required fields decode to empty strings when absent or null; the store rejects them at save
/// time. Producers may send numbers for the text fields and epoch milliseconds for `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default, deserialize_with = "text_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub user_id: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgent: Option<bool>,
    #[serde(
        default,
        deserialize_with = "rfc3339_or_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
}

fn text_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Option::<TextOrNumber>::deserialize(deserializer)? {
        Some(TextOrNumber::Text(text)) => text,
        Some(TextOrNumber::Integer(n)) => n.to_string(),
        Some(TextOrNumber::Unsigned(n)) => n.to_string(),
        Some(TextOrNumber::Float(n)) => n.to_string(),
        None => String::new(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimestampRepr {
    Rfc3339(DateTime<Utc>),
    Millis(i64),
}

fn rfc3339_or_millis<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    match Option::<TimestampRepr>::deserialize(deserializer)? {
        Some(TimestampRepr::Rfc3339(at)) => Ok(Some(at)),
        Some(TimestampRepr::Millis(ms)) => DateTime::<Utc>::from_timestamp_millis(ms)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp {ms} is out of range"))),
        None => Ok(None),
    }
}

/// Notification as held by the durable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub body: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub urgent: bool,
    pub read: bool,
    pub dismissed: bool,
    pub due_date: Option<DateTime<Utc>>,
    pub intervals_sent: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    /// Build a fresh record, filling in defaults for everything the producer left out.
    pub fn from_notification(notification: &Notification, now: DateTime<Utc>) -> Self {
        Self {
            id: notification.id.clone(),
            user_id: notification.user_id.clone(),
            title: notification.title.clone(),
            body: notification.body.clone().unwrap_or_default(),
            kind: notification
                .kind
                .clone()
                .unwrap_or_else(|| DEFAULT_KIND.to_string()),
            urgent: notification.urgent.unwrap_or(false),
            read: false,
            dismissed: false,
            due_date: None,
            intervals_sent: Vec::new(),
            created_at: notification.timestamp.unwrap_or(now),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + retention()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() <= now
    }

    /// Names of required fields that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.id.is_empty() {
            missing.push("id");
        }
        if self.user_id.is_empty() {
            missing.push("userId");
        }
        if self.title.is_empty() {
            missing.push("title");
        }
        missing
    }
}

pub fn retention() -> Duration {
    Duration::seconds(RETENTION_SECONDS)
}
