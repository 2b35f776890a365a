//! # Content Pipeline Webhook
//!
//! HTTP delivery for lifecycle notifications. [`WebhookNotifier`] implements
//! the core [`Notifier`](content_pipeline_core::notify::Notifier) trait by
//! POSTing the notification as JSON with a shared-secret header.
//!
//! ## Example
//!
//! ```no_run
//! use content_pipeline_webhook::WebhookNotifier;
//! use std::time::Duration;
//!
//! // Reads WEBHOOK_URL and WEBHOOK_SECRET
//! let notifier = WebhookNotifier::from_env()?.with_timeout(Duration::from_secs(5));
//! # Ok::<(), content_pipeline_webhook::WebhookError>(())
//! ```
//!
//! A 2xx response is success. Anything else, including transport errors, is
//! reported as a [`WebhookError`] and converted to a
//! [`NotifyError`](content_pipeline_core::notify::NotifyError) at the trait
//! boundary. There is no retry.

pub mod client;
pub mod error;

pub use client::{DEFAULT_TIMEOUT, SECRET_HEADER, WebhookNotifier};
pub use error::WebhookError;
