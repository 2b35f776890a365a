//! Notifier doubles.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use content_pipeline_core::notify::{LifecycleNotification, Notifier, NotifyError, NotifyFuture};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Notifier that records every notification it receives.
///
/// Notifications are dispatched on background tasks, so tests wait for them
/// with [`RecordingNotifier::wait_for`] instead of asserting immediately.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    received: Arc<Mutex<Vec<LifecycleNotification>>>,
    signal: Arc<Notify>,
}

impl RecordingNotifier {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far
    #[must_use]
    pub fn received(&self) -> Vec<LifecycleNotification> {
        self.received.lock().unwrap().clone()
    }

    /// Number of notifications received so far
    #[must_use]
    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    /// Wait until at least `count` notifications arrived, or `timeout`
    /// elapsed. Returns whatever was received.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<LifecycleNotification> {
        let wait = async {
            loop {
                let notified = self.signal.notified();
                if self.count() >= count {
                    return;
                }
                notified.await;
            }
        };
        let _ = tokio::time::timeout(timeout, wait).await;
        self.received()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: LifecycleNotification) -> NotifyFuture<'_> {
        Box::pin(async move {
            self.received.lock().unwrap().push(notification);
            self.signal.notify_waiters();
            Ok(())
        })
    }
}

/// Notifier that always fails, counting its attempts.
#[derive(Clone, Debug, Default)]
pub struct FailingNotifier {
    attempts: Arc<Mutex<usize>>,
    signal: Arc<Notify>,
}

impl FailingNotifier {
    /// Create a failing notifier
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivery attempts so far
    #[must_use]
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    /// Wait until at least `count` attempts were made, or `timeout` elapsed.
    pub async fn wait_for_attempts(&self, count: usize, timeout: Duration) -> usize {
        let wait = async {
            loop {
                let notified = self.signal.notified();
                if self.attempts() >= count {
                    return;
                }
                notified.await;
            }
        };
        let _ = tokio::time::timeout(timeout, wait).await;
        self.attempts()
    }
}

impl Notifier for FailingNotifier {
    fn notify(&self, _notification: LifecycleNotification) -> NotifyFuture<'_> {
        Box::pin(async move {
            *self.attempts.lock().unwrap() += 1;
            self.signal.notify_waiters();
            Err(NotifyError::Rejected {
                status: 500,
                body: "simulated failure".to_string(),
            })
        })
    }
}
