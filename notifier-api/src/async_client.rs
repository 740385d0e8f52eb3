use async_trait::async_trait;
use chrono::Utc;
use log::info;
use notifier_models::core::Notification;
use reqwest::{Client, Response, Url};

use crate::{
    RealtimeNotifier,
    error::{ApiError, Result},
    types::RealtimePayload,
};

/// HTTP client for the real-time delivery service. Fire-and-forget: no retries, no queuing.
#[derive(Clone)]
pub struct RealtimeClient {
    client: Client,
    endpoint: Url,
}

impl RealtimeClient {
    /// Construct a client with the default `reqwest::Client` configuration.
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = Client::builder().build()?;
        Self::with_client(endpoint, client)
    }

    /// Construct a client using a preconfigured HTTP client instance.
    pub fn with_client(endpoint: &str, client: Client) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|source| ApiError::InvalidUrl {
            url: endpoint.to_string(),
            source,
        })?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn handle_response(url: Url, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read body>".into());
            Err(ApiError::Http { status, url, message })
        }
    }
}

#[async_trait]
impl RealtimeNotifier for RealtimeClient {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let payload = RealtimePayload::from_notification(notification, Utc::now());
        let url = self.endpoint.clone();
        let response = self.client.post(url.clone()).json(&payload).send().await?;
        Self::handle_response(url, response).await?;
        info!(
            "Notification sent to real-time service successfully for user {}",
            notification.user_id
        );
        Ok(())
    }
}
