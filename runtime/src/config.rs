//! Configuration management for the content pipeline.
//!
//! Loads configuration from environment variables with sensible defaults.

use content_pipeline_core::cadence::{
    CadenceConfig, CadenceError, CadenceSettings, CadenceViolation, validate_cadence_config,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Read-view cache configuration
    pub cache: CacheConfig,
    /// Outbound webhook configuration
    pub webhook: WebhookConfig,
    /// Cadence settings as supplied, before validation
    pub cadence: CadenceSettings,
    /// Cadence variables that were set but not numeric. The matching field in
    /// `cadence` holds its default.
    #[serde(skip)]
    pub cadence_parse_errors: Vec<CadenceViolation>,
    /// Fallback log filter when `RUST_LOG` is unset
    pub log_level: String,
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for entries stored without an explicit one
    pub default_ttl_secs: u64,
    /// Background sweep period
    pub sweep_interval_secs: u64,
}

impl CacheConfig {
    /// Sweep period as a [`Duration`]
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Webhook configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Endpoint URL. Unset means notifications are only logged.
    pub url: Option<String>,
    /// Shared secret sent in the secret header
    pub secret: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl WebhookConfig {
    /// Request timeout as a [`Duration`]
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unparseable values fall back to their defaults. Unparseable cadence
    /// values are also recorded and reported by [`Config::cadence_violations`].
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cadence_parse_errors = Vec::new();
        let mut cadence_number = |key: &'static str| -> Option<i64> {
            let raw = lookup(key)?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    cadence_parse_errors.push(CadenceViolation::NotAnInteger {
                        field: key,
                        value: raw,
                    });
                    None
                }
            }
        };
        let cadence = CadenceSettings {
            interval_days: Some(cadence_number("CADENCE_INTERVAL_DAYS").unwrap_or(7)),
            publish_hour: Some(cadence_number("CADENCE_PUBLISH_HOUR").unwrap_or(9)),
            time_zone: None,
            draft_lead_hours: Some(cadence_number("CADENCE_DRAFT_LEAD_HOURS").unwrap_or(48)),
            reminder_lead_hours: cadence_number("CADENCE_REMINDER_LEAD_HOURS"),
        };

        Self {
            cache: CacheConfig {
                default_ttl_secs: lookup("CACHE_DEFAULT_TTL_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
                sweep_interval_secs: lookup("CACHE_SWEEP_INTERVAL_SECS")
                    .and_then(|s| s.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(60),
            },
            webhook: WebhookConfig {
                url: lookup("WEBHOOK_URL").filter(|url| !url.trim().is_empty()),
                secret: lookup("WEBHOOK_SECRET").unwrap_or_default(),
                timeout_secs: lookup("WEBHOOK_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            },
            cadence: CadenceSettings {
                time_zone: Some(lookup("CADENCE_TIME_ZONE").unwrap_or_else(|| "UTC".to_string())),
                ..cadence
            },
            cadence_parse_errors,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }

    /// Every problem with the cadence settings: unparseable variables first,
    /// then violated invariants. Empty means valid.
    #[must_use]
    pub fn cadence_violations(&self) -> Vec<CadenceViolation> {
        let mut violations = self.cadence_parse_errors.clone();
        violations.extend(validate_cadence_config(&self.cadence));
        violations
    }

    /// Validated cadence configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CadenceError::Invalid`] listing every problem reported by
    /// [`Config::cadence_violations`].
    pub fn cadence_config(&self) -> Result<CadenceConfig, CadenceError> {
        if !self.cadence_parse_errors.is_empty() {
            return Err(CadenceError::Invalid(self.cadence_violations()));
        }
        CadenceConfig::try_from(self.cadence.clone())
    }
}
