//! Outbound notification capability.
//!
//! The engine notifies exactly one external collaborator, on exactly one
//! event: a post entering `REGENERATE`. Delivery is at-most-once and
//! best-effort: callers dispatch the notification on a background task, log
//! any failure, and never retry.

use crate::types::{Post, PostId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Event name sent when a post is sent back for regeneration.
pub const POST_REGENERATE_EVENT: &str = "post.regenerate";

/// Payload delivered to the notifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleNotification {
    /// Event name (`post.regenerate`)
    pub event: String,
    /// Post the event is about
    pub post_id: PostId,
    /// Post as stored after the transition
    pub post: Post,
    /// When the event was produced
    pub timestamp: DateTime<Utc>,
}

impl LifecycleNotification {
    /// Build a `post.regenerate` notification for `post`.
    #[must_use]
    pub fn regenerate(post: Post, timestamp: DateTime<Utc>) -> Self {
        Self {
            event: POST_REGENERATE_EVENT.to_string(),
            post_id: post.id.clone(),
            post,
            timestamp,
        }
    }
}

/// Notification delivery failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The request never produced a response.
    #[error("Notification transport failed: {0}")]
    Transport(String),

    /// The endpoint answered with a non-2xx status.
    #[error("Notification rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// The notifier is misconfigured.
    #[error("Notifier configuration error: {0}")]
    Configuration(String),
}

/// Boxed future returned by [`Notifier::notify`].
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>>;

/// Outbound notification collaborator.
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if delivery fails. Callers log the error and
    /// carry on.
    fn notify(&self, notification: LifecycleNotification) -> NotifyFuture<'_>;
}

/// Notifier used when no endpoint is configured: records the event in the
/// log and reports success.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify(&self, notification: LifecycleNotification) -> NotifyFuture<'_> {
        Box::pin(async move {
            tracing::info!(
                event = %notification.event,
                post_id = %notification.post_id,
                "No webhook configured, notification logged only"
            );
            Ok(())
        })
    }
}
