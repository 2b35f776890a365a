//! Error types for the webhook notifier

use content_pipeline_core::notify::NotifyError;
use thiserror::Error;

/// Errors that can occur when delivering a webhook
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Missing `WEBHOOK_URL` environment variable
    #[error("Missing WEBHOOK_URL environment variable")]
    MissingEndpoint,

    /// HTTP request failed before a response arrived
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Endpoint answered with a non-2xx status
    #[error("Webhook rejected (status {status}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },
}

impl From<WebhookError> for NotifyError {
    fn from(error: WebhookError) -> Self {
        match error {
            WebhookError::MissingEndpoint => Self::Configuration(error.to_string()),
            WebhookError::RequestFailed(message) => Self::Transport(message),
            WebhookError::Rejected { status, message } => Self::Rejected {
                status,
                body: message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_maps_to_notify_rejected() {
        let error: NotifyError = WebhookError::Rejected {
            status: 503,
            message: "busy".to_string(),
        }
        .into();
        assert_eq!(
            error,
            NotifyError::Rejected {
                status: 503,
                body: "busy".to_string()
            }
        );
    }

    #[test]
    fn missing_endpoint_is_a_configuration_error() {
        let error: NotifyError = WebhookError::MissingEndpoint.into();
        assert!(matches!(error, NotifyError::Configuration(_)));
    }

    #[test]
    fn request_failure_maps_to_transport() {
        let error: NotifyError = WebhookError::RequestFailed("connection refused".to_string()).into();
        assert_eq!(error, NotifyError::Transport("connection refused".to_string()));
    }
}
