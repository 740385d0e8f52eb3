use chrono::{DateTime, Utc};
use notifier_models::core::Notification;
use serde::Serialize;

/// Body posted to the real-time delivery endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimePayload {
    pub user_id: String,
    pub notification: RealtimeNotification,
}

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeNotification {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgent: Option<bool>,
    pub timestamp: DateTime<Utc>,
}

impl RealtimePayload {
    /// Fields are forwarded as the producer sent them; only a missing timestamp is filled in.
    pub fn from_notification(notification: &Notification, now: DateTime<Utc>) -> Self {
        Self {
            user_id: notification.user_id.clone(),
            notification: RealtimeNotification {
                id: notification.id.clone(),
                title: notification.title.clone(),
                body: notification.body.clone(),
                kind: notification.kind.clone(),
                urgent: notification.urgent,
                timestamp: notification.timestamp.unwrap_or(now),
            },
        }
    }
}
