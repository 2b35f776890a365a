//! Cadence configuration and publish slots.
//!
//! Callers supply [`CadenceSettings`] (every field optional, as it arrives
//! from configuration or a request body). [`validate_cadence_config`] reports
//! every violated invariant at once; a [`CadenceConfig`] can only be built
//! from settings that pass validation.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest accepted interval between slots (about ten years)
pub const MAX_INTERVAL_DAYS: i64 = 3660;

/// Longest accepted draft or reminder lead
pub const MAX_LEAD_HOURS: i64 = MAX_INTERVAL_DAYS * 24;

/// Raw, possibly incomplete cadence settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CadenceSettings {
    /// Days between publish slots
    pub interval_days: Option<i64>,
    /// Local hour of day (0-23) at which posts publish
    pub publish_hour: Option<i64>,
    /// IANA time zone name, e.g. `America/Toronto`
    pub time_zone: Option<String>,
    /// Hours before a slot at which draft creation starts
    pub draft_lead_hours: Option<i64>,
    /// Hours before a slot at which a reminder fires
    pub reminder_lead_hours: Option<i64>,
}

/// A single violated cadence invariant.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CadenceViolation {
    /// `interval_days` was not supplied
    #[error("intervalDays is required")]
    MissingInterval,
    /// `interval_days` < 1
    #[error("intervalDays must be at least 1 (got {0})")]
    IntervalTooShort(i64),
    /// `interval_days` > [`MAX_INTERVAL_DAYS`]
    #[error("intervalDays must be at most {MAX_INTERVAL_DAYS} (got {0})")]
    IntervalTooLong(i64),
    /// `publish_hour` was not supplied
    #[error("publishHour is required")]
    MissingPublishHour,
    /// `publish_hour` outside 0-23
    #[error("publishHour must be between 0 and 23 (got {0})")]
    PublishHourOutOfRange(i64),
    /// `time_zone` was not supplied
    #[error("timeZone is required")]
    MissingTimeZone,
    /// `time_zone` is not a known zone identifier
    #[error("timeZone '{0}' is not a recognized time zone")]
    UnknownTimeZone(String),
    /// `draft_lead_hours` was not supplied
    #[error("draftLeadHours is required")]
    MissingDraftLead,
    /// `draft_lead_hours` < 1
    #[error("draftLeadHours must be at least 1 (got {0})")]
    DraftLeadTooShort(i64),
    /// `draft_lead_hours` > [`MAX_LEAD_HOURS`]
    #[error("draftLeadHours must be at most {MAX_LEAD_HOURS} (got {0})")]
    DraftLeadTooLong(i64),
    /// `reminder_lead_hours` > [`MAX_LEAD_HOURS`]
    #[error("reminderLeadHours must be at most {MAX_LEAD_HOURS} (got {0})")]
    ReminderLeadTooLong(i64),
    /// A raw value could not be read as a number
    #[error("{field} must be an integer (got '{value}')")]
    NotAnInteger {
        /// Setting name
        field: &'static str,
        /// Raw value as supplied
        value: String,
    },
}

/// Errors building a [`CadenceConfig`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CadenceError {
    /// The settings violate one or more invariants.
    #[error("Invalid cadence configuration: {}", format_violations(.0))]
    Invalid(Vec<CadenceViolation>),
}

fn format_violations(violations: &[CadenceViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Report every invariant the settings violate. Empty means valid.
///
/// # Example
///
/// ```
/// use content_pipeline_core::cadence::{validate_cadence_config, CadenceSettings, CadenceViolation};
///
/// let settings = CadenceSettings {
///     interval_days: Some(0),
///     publish_hour: Some(24),
///     time_zone: Some("Mars/Olympus".to_string()),
///     draft_lead_hours: Some(0),
///     reminder_lead_hours: None,
/// };
/// let violations = validate_cadence_config(&settings);
/// assert_eq!(violations.len(), 4);
/// assert!(violations.contains(&CadenceViolation::PublishHourOutOfRange(24)));
/// ```
#[must_use]
pub fn validate_cadence_config(settings: &CadenceSettings) -> Vec<CadenceViolation> {
    let mut violations = Vec::new();

    match settings.interval_days {
        None => violations.push(CadenceViolation::MissingInterval),
        Some(days) if days < 1 => violations.push(CadenceViolation::IntervalTooShort(days)),
        Some(days) if days > MAX_INTERVAL_DAYS => {
            violations.push(CadenceViolation::IntervalTooLong(days));
        }
        Some(_) => {}
    }

    match settings.publish_hour {
        None => violations.push(CadenceViolation::MissingPublishHour),
        Some(hour) if !(0..=23).contains(&hour) => {
            violations.push(CadenceViolation::PublishHourOutOfRange(hour));
        }
        Some(_) => {}
    }

    match settings.time_zone.as_deref().map(str::trim) {
        None | Some("") => violations.push(CadenceViolation::MissingTimeZone),
        Some(name) if name.parse::<Tz>().is_err() => {
            violations.push(CadenceViolation::UnknownTimeZone(name.to_string()));
        }
        Some(_) => {}
    }

    match settings.draft_lead_hours {
        None => violations.push(CadenceViolation::MissingDraftLead),
        Some(hours) if hours < 1 => violations.push(CadenceViolation::DraftLeadTooShort(hours)),
        Some(hours) if hours > MAX_LEAD_HOURS => {
            violations.push(CadenceViolation::DraftLeadTooLong(hours));
        }
        Some(_) => {}
    }

    if let Some(hours) = settings.reminder_lead_hours.filter(|hours| *hours > MAX_LEAD_HOURS) {
        violations.push(CadenceViolation::ReminderLeadTooLong(hours));
    }

    violations
}

/// Validated cadence configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CadenceConfig {
    interval_days: u32,
    publish_hour: u32,
    time_zone: Tz,
    draft_lead_hours: u32,
    reminder_lead_hours: Option<u32>,
}

impl CadenceConfig {
    /// Build a configuration from its required parts.
    ///
    /// # Errors
    ///
    /// Returns [`CadenceError::Invalid`] listing every violated invariant.
    pub fn new(
        interval_days: i64,
        publish_hour: i64,
        time_zone: &str,
        draft_lead_hours: i64,
    ) -> Result<Self, CadenceError> {
        Self::try_from(CadenceSettings {
            interval_days: Some(interval_days),
            publish_hour: Some(publish_hour),
            time_zone: Some(time_zone.to_string()),
            draft_lead_hours: Some(draft_lead_hours),
            reminder_lead_hours: None,
        })
    }

    /// Attach a reminder lead time (hours before the slot), clamped to
    /// `0..=MAX_LEAD_HOURS`.
    #[must_use]
    pub fn with_reminder_lead_hours(mut self, hours: i64) -> Self {
        self.reminder_lead_hours = Some(clamp_lead(hours));
        self
    }

    /// Days between publish slots (≥ 1)
    #[must_use]
    pub const fn interval_days(&self) -> u32 {
        self.interval_days
    }

    /// Local publish hour (0-23)
    #[must_use]
    pub const fn publish_hour(&self) -> u32 {
        self.publish_hour
    }

    /// Zone the publish hour is expressed in
    #[must_use]
    pub const fn time_zone(&self) -> Tz {
        self.time_zone
    }

    /// Hours before a slot at which draft creation starts (≥ 1)
    #[must_use]
    pub const fn draft_lead_hours(&self) -> u32 {
        self.draft_lead_hours
    }

    /// Hours before a slot at which a reminder fires
    #[must_use]
    pub const fn reminder_lead_hours(&self) -> Option<u32> {
        self.reminder_lead_hours
    }

    /// Convert back into raw settings (e.g. for display or persistence).
    #[must_use]
    pub fn to_settings(&self) -> CadenceSettings {
        CadenceSettings {
            interval_days: Some(i64::from(self.interval_days)),
            publish_hour: Some(i64::from(self.publish_hour)),
            time_zone: Some(self.time_zone.name().to_string()),
            draft_lead_hours: Some(i64::from(self.draft_lead_hours)),
            reminder_lead_hours: self.reminder_lead_hours.map(i64::from),
        }
    }
}

impl TryFrom<CadenceSettings> for CadenceConfig {
    type Error = CadenceError;

    fn try_from(settings: CadenceSettings) -> Result<Self, Self::Error> {
        let violations = validate_cadence_config(&settings);
        if !violations.is_empty() {
            return Err(CadenceError::Invalid(violations));
        }

        let invalid = || CadenceError::Invalid(validate_cadence_config(&settings));
        let positive = |value: Option<i64>| value.and_then(|v| u32::try_from(v).ok());

        let time_zone = settings
            .time_zone
            .as_deref()
            .map(str::trim)
            .and_then(|name| name.parse::<Tz>().ok())
            .ok_or_else(invalid)?;

        Ok(Self {
            interval_days: positive(settings.interval_days).ok_or_else(invalid)?,
            publish_hour: positive(settings.publish_hour).ok_or_else(invalid)?,
            time_zone,
            draft_lead_hours: positive(settings.draft_lead_hours).ok_or_else(invalid)?,
            reminder_lead_hours: settings.reminder_lead_hours.map(clamp_lead),
        })
    }
}

fn clamp_lead(hours: i64) -> u32 {
    u32::try_from(hours.clamp(0, MAX_LEAD_HOURS)).unwrap_or(0)
}

/// A computed publish slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    /// Instant the post should go live
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub publish_at: DateTime<Utc>,
    /// Instant draft creation should begin
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub create_at: DateTime<Utc>,
    /// Instant a reminder should fire, when configured
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub remind_at: Option<DateTime<Utc>>,
}

impl Slot {
    /// Publish instant as epoch milliseconds
    #[must_use]
    pub fn publish_at_millis(&self) -> i64 {
        self.publish_at.timestamp_millis()
    }

    /// Draft-creation instant as epoch milliseconds
    #[must_use]
    pub fn create_at_millis(&self) -> i64 {
        self.create_at.timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CadenceSettings {
        CadenceSettings {
            interval_days: Some(7),
            publish_hour: Some(9),
            time_zone: Some("America/Toronto".to_string()),
            draft_lead_hours: Some(48),
            reminder_lead_hours: Some(2),
        }
    }

    #[test]
    fn valid_settings_have_no_violations() {
        assert!(validate_cadence_config(&valid()).is_empty());
    }

    #[test]
    fn empty_settings_report_every_missing_field() {
        let violations = validate_cadence_config(&CadenceSettings::default());
        assert_eq!(
            violations,
            vec![
                CadenceViolation::MissingInterval,
                CadenceViolation::MissingPublishHour,
                CadenceViolation::MissingTimeZone,
                CadenceViolation::MissingDraftLead,
            ]
        );
    }

    #[test]
    fn boundary_values() {
        let mut settings = valid();
        settings.publish_hour = Some(0);
        settings.interval_days = Some(1);
        settings.draft_lead_hours = Some(1);
        assert!(validate_cadence_config(&settings).is_empty());

        settings.publish_hour = Some(-1);
        assert_eq!(
            validate_cadence_config(&settings),
            vec![CadenceViolation::PublishHourOutOfRange(-1)]
        );
    }

    #[test]
    fn config_from_valid_settings() {
        let config = CadenceConfig::try_from(valid());
        let Ok(config) = config else {
            unreachable!("valid settings must convert");
        };
        assert_eq!(config.interval_days(), 7);
        assert_eq!(config.time_zone(), chrono_tz::America::Toronto);
        assert_eq!(config.reminder_lead_hours(), Some(2));
        assert_eq!(config.to_settings(), valid());
    }

    #[test]
    fn config_rejects_invalid_settings_with_all_violations() {
        let result = CadenceConfig::new(0, 25, "Nowhere/City", 0);
        match result {
            Err(CadenceError::Invalid(violations)) => assert_eq!(violations.len(), 4),
            Ok(_) => unreachable!("invalid settings must not convert"),
        }
    }

    #[test]
    fn oversized_values_are_rejected_with_a_reason() {
        let Err(CadenceError::Invalid(violations)) = CadenceConfig::new(5_000_000_000, 9, "UTC", 1)
        else {
            unreachable!("an interval beyond u32 must not convert");
        };
        assert_eq!(violations, vec![CadenceViolation::IntervalTooLong(5_000_000_000)]);

        let Err(CadenceError::Invalid(violations)) = CadenceConfig::new(7, 9, "UTC", 4_000_000_000)
        else {
            unreachable!("a lead beyond u32 must not convert");
        };
        assert_eq!(violations, vec![CadenceViolation::DraftLeadTooLong(4_000_000_000)]);

        let Err(CadenceError::Invalid(violations)) =
            CadenceConfig::new(100_000_000, 23, "America/Toronto", 1)
        else {
            unreachable!("an interval past the calendar range must not convert");
        };
        assert_eq!(violations, vec![CadenceViolation::IntervalTooLong(100_000_000)]);
    }

    #[test]
    fn upper_bounds_are_inclusive() {
        let mut settings = valid();
        settings.interval_days = Some(MAX_INTERVAL_DAYS);
        settings.draft_lead_hours = Some(MAX_LEAD_HOURS);
        settings.reminder_lead_hours = Some(MAX_LEAD_HOURS);
        assert!(validate_cadence_config(&settings).is_empty());

        settings.reminder_lead_hours = Some(MAX_LEAD_HOURS + 1);
        assert_eq!(
            validate_cadence_config(&settings),
            vec![CadenceViolation::ReminderLeadTooLong(MAX_LEAD_HOURS + 1)]
        );
    }

    #[test]
    fn reminder_lead_is_clamped() {
        let Ok(config) = CadenceConfig::new(7, 9, "UTC", 48) else {
            unreachable!("valid settings must convert");
        };
        assert_eq!(
            config.clone().with_reminder_lead_hours(-5).reminder_lead_hours(),
            Some(0)
        );
        assert_eq!(
            config.with_reminder_lead_hours(i64::MAX).reminder_lead_hours().map(i64::from),
            Some(MAX_LEAD_HOURS)
        );
    }

    #[test]
    fn error_message_lists_violations() {
        let error = CadenceError::Invalid(vec![
            CadenceViolation::IntervalTooShort(0),
            CadenceViolation::MissingTimeZone,
        ]);
        assert_eq!(
            error.to_string(),
            "Invalid cadence configuration: intervalDays must be at least 1 (got 0); timeZone is required"
        );
    }
}
