//! Wiring of the service from [`Config`].
//!
//! The store is always supplied by the caller; everything else is built from
//! configuration.

use crate::cache::{SweeperHandle, TagCache};
use crate::config::{Config, WebhookConfig};
use crate::service::ContentLifecycleService;
use content_pipeline_core::environment::Clock;
use content_pipeline_core::notify::{LoggingNotifier, Notifier};
use content_pipeline_core::store::DocumentStore;
use content_pipeline_webhook::WebhookNotifier;
use std::sync::Arc;

/// Pick the notifier: webhook delivery when a URL is configured, log-only
/// otherwise.
#[must_use]
pub fn build_notifier(config: &WebhookConfig) -> Arc<dyn Notifier> {
    match &config.url {
        Some(url) => {
            tracing::info!(endpoint = %url, "Webhook notifier configured");
            Arc::new(WebhookNotifier::new(url, &config.secret).with_timeout(config.timeout()))
        }
        None => {
            tracing::warn!("WEBHOOK_URL not set, regenerate notifications will only be logged");
            Arc::new(LoggingNotifier)
        }
    }
}

/// Build the service over `store`.
#[must_use]
pub fn build_service(
    config: &Config,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
) -> ContentLifecycleService {
    let cache = TagCache::with_default_ttl(Arc::clone(&clock), config.cache.default_ttl_secs);
    ContentLifecycleService::new(store, cache, build_notifier(&config.webhook), clock)
}

/// A running service together with its cache sweeper.
#[derive(Debug)]
pub struct Application {
    /// The service
    pub service: ContentLifecycleService,
    sweeper: SweeperHandle,
}

impl Application {
    /// Build the service and start the background cache sweep. Must be
    /// called inside a Tokio runtime.
    #[must_use]
    pub fn start(config: &Config, store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        let service = build_service(config, store, clock);
        let sweeper = service.cache().spawn_sweeper(config.cache.sweep_interval());
        tracing::info!(
            sweep_interval_secs = config.cache.sweep_interval_secs,
            "Content pipeline started"
        );
        Self { service, sweeper }
    }

    /// Stop the sweeper and wait for it to exit.
    pub async fn shutdown(self) {
        self.sweeper.shutdown().await;
        tracing::info!("Content pipeline stopped");
    }
}
