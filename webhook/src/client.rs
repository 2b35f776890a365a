//! Webhook notifier implementation

use crate::error::WebhookError;
use content_pipeline_core::notify::{LifecycleNotification, Notifier, NotifyFuture};
use reqwest::Client;
use std::time::Duration;

/// Header carrying the shared secret
pub const SECRET_HEADER: &str = "x-webhook-secret";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Notifier that POSTs lifecycle notifications as JSON to a fixed endpoint
#[derive(Clone, Debug)]
pub struct WebhookNotifier {
    client: Client,
    endpoint: String,
    secret: String,
    timeout: Duration,
}

impl WebhookNotifier {
    /// Create a notifier from `WEBHOOK_URL` and `WEBHOOK_SECRET`
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::MissingEndpoint` if `WEBHOOK_URL` is not set
    pub fn from_env() -> Result<Self, WebhookError> {
        let endpoint = std::env::var("WEBHOOK_URL").map_err(|_| WebhookError::MissingEndpoint)?;
        let secret = std::env::var("WEBHOOK_SECRET").unwrap_or_default();

        Ok(Self::new(endpoint, secret))
    }

    /// Create a notifier with an explicit endpoint and secret
    #[must_use]
    pub fn new(endpoint: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            secret: secret.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-request timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Endpoint notifications are sent to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one notification
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::RequestFailed` on transport errors and
    /// `WebhookError::Rejected` for any non-2xx response
    pub async fn send(&self, notification: &LifecycleNotification) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(SECRET_HEADER, &self.secret)
            .timeout(self.timeout)
            .json(notification)
            .send()
            .await
            .map_err(|e| WebhookError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(
                event = %notification.event,
                post_id = %notification.post_id,
                status = status.as_u16(),
                "Webhook delivered"
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(WebhookError::Rejected {
            status: status.as_u16(),
            message: body,
        })
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, notification: LifecycleNotification) -> NotifyFuture<'_> {
        Box::pin(async move { self.send(&notification).await.map_err(Into::into) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifier_creation() {
        let notifier = WebhookNotifier::new("http://localhost:9000/hooks", "s3cret");
        assert_eq!(notifier.endpoint(), "http://localhost:9000/hooks");
        assert_eq!(notifier.secret, "s3cret");
        assert_eq!(notifier.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_timeout_override() {
        let notifier = WebhookNotifier::new("http://localhost", "").with_timeout(Duration::from_secs(2));
        assert_eq!(notifier.timeout, Duration::from_secs(2));
    }
}
