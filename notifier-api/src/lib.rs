mod async_client;
mod error;
mod types;

pub use async_client::RealtimeClient;
pub use error::{ApiError, Result};
pub use types::{RealtimeNotification, RealtimePayload};

use async_trait::async_trait;
use notifier_models::core::Notification;

/// Sink for best-effort real-time delivery of a notification to a connected user.
#[async_trait]
pub trait RealtimeNotifier: Send + Sync + 'static {
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}
