//! Cadence scheduler: when to draft and when to publish.
//!
//! Slots live on a grid anchored at 1970-01-01: a local calendar day is a
//! publish day iff its day count from the epoch is a multiple of the
//! interval. Every caller therefore sees the same slot sequence no matter when
//! it asks.
//!
//! Wall-clock resolution goes through the zone database (`chrono-tz`). A
//! publish hour that falls into a DST gap resolves to the first valid instant
//! after the gap; an ambiguous hour resolves to the earlier instant.

use chrono::{
    DateTime, Datelike, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc,
};
use chrono_tz::Tz;
use content_pipeline_core::cadence::{CadenceConfig, Slot};
use content_pipeline_core::environment::Clock;
use std::iter::FusedIterator;
use std::sync::Arc;

pub use content_pipeline_core::cadence::{
    CadenceSettings, CadenceViolation, validate_cadence_config,
};

/// `NaiveDate::num_days_from_ce` of 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// Granularity used to find the end of a DST gap
const GAP_STEP_MINUTES: i64 = 15;

/// Compute the next publish slot strictly after `now`.
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use content_pipeline_core::cadence::CadenceConfig;
/// use content_pipeline_runtime::cadence::compute_next_slots;
///
/// let config = CadenceConfig::new(1, 9, "UTC", 6)?;
/// let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
/// let slot = compute_next_slots(now, &config);
///
/// assert_eq!(slot.publish_at, Utc.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap());
/// assert_eq!(slot.create_at, Utc.with_ymd_and_hms(2026, 3, 3, 3, 0, 0).unwrap());
/// # Ok::<(), content_pipeline_core::cadence::CadenceError>(())
/// ```
#[must_use]
pub fn compute_next_slots(now: DateTime<Utc>, config: &CadenceConfig) -> Slot {
    let tz = config.time_zone();
    let interval = i64::from(config.interval_days());
    let hour = config.publish_hour();

    let mut day = now.with_timezone(&tz).date_naive();
    if resolve_local(tz, day, hour) <= now {
        day = add_days(day, interval);
    }

    let offset = days_since_epoch(day).rem_euclid(interval);
    if offset != 0 {
        day = add_days(day, interval - offset);
    }

    slot_for(resolve_local(tz, day, hour), config)
}

/// Returns `true` once `now` has reached the draft-creation instant of the
/// next slot.
#[must_use]
pub fn should_create_draft_at(now: DateTime<Utc>, config: &CadenceConfig) -> bool {
    now >= compute_next_slots(now, config).create_at
}

/// The next `count` slots after `now`.
#[must_use]
pub fn upcoming_slots(now: DateTime<Utc>, config: &CadenceConfig, count: usize) -> UpcomingSlots {
    UpcomingSlots::new(now, config.clone(), count)
}

/// Lazy, finite sequence of consecutive slots.
///
/// Each slot is derived from the previous publish instant, so the sequence
/// follows the zone's rules across DST changes. The iterator is `Clone` and
/// can be rewound with [`UpcomingSlots::restart`].
#[derive(Clone, Debug)]
pub struct UpcomingSlots {
    config: CadenceConfig,
    start: DateTime<Utc>,
    cursor: DateTime<Utc>,
    count: usize,
    remaining: usize,
}

impl UpcomingSlots {
    fn new(start: DateTime<Utc>, config: CadenceConfig, count: usize) -> Self {
        Self {
            config,
            start,
            cursor: start,
            count,
            remaining: count,
        }
    }

    /// Rewind to the first slot.
    pub fn restart(&mut self) {
        self.cursor = self.start;
        self.remaining = self.count;
    }
}

impl Iterator for UpcomingSlots {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        if self.remaining == 0 {
            return None;
        }
        let slot = compute_next_slots(self.cursor, &self.config);
        self.cursor = slot.publish_at;
        self.remaining -= 1;
        Some(slot)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for UpcomingSlots {}

impl FusedIterator for UpcomingSlots {}

/// Clock-bound facade over the slot functions.
#[derive(Clone)]
pub struct CadenceScheduler {
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CadenceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CadenceScheduler").finish_non_exhaustive()
    }
}

impl CadenceScheduler {
    /// Create a scheduler reading time from `clock`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Next slot after the current instant
    #[must_use]
    pub fn next_slots(&self, config: &CadenceConfig) -> Slot {
        compute_next_slots(self.clock.now(), config)
    }

    /// Whether draft creation for the next slot should start now
    #[must_use]
    pub fn should_create_draft(&self, config: &CadenceConfig) -> bool {
        should_create_draft_at(self.clock.now(), config)
    }

    /// Next slot and whether its draft is due, both judged at one reading
    /// of the clock.
    #[must_use]
    pub fn next_slot_with_due(&self, config: &CadenceConfig) -> (Slot, bool) {
        let now = self.clock.now();
        let slot = compute_next_slots(now, config);
        (slot, now >= slot.create_at)
    }

    /// The next `count` slots after the current instant
    #[must_use]
    pub fn upcoming_slots(&self, config: &CadenceConfig, count: usize) -> UpcomingSlots {
        upcoming_slots(self.clock.now(), config, count)
    }
}

fn slot_for(publish_at: DateTime<Utc>, config: &CadenceConfig) -> Slot {
    Slot {
        publish_at,
        create_at: hours_before(publish_at, config.draft_lead_hours()),
        remind_at: config
            .reminder_lead_hours()
            .map(|hours| hours_before(publish_at, hours)),
    }
}

/// Saturates at the earliest representable instant.
fn hours_before(instant: DateTime<Utc>, hours: u32) -> DateTime<Utc> {
    instant
        .checked_sub_signed(TimeDelta::hours(i64::from(hours)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn days_since_epoch(day: NaiveDate) -> i64 {
    i64::from(day.num_days_from_ce()) - UNIX_EPOCH_DAYS_FROM_CE
}

fn add_days(day: NaiveDate, days: i64) -> NaiveDate {
    day.checked_add_signed(TimeDelta::days(days)).unwrap_or(NaiveDate::MAX)
}

/// The instant `day` at `hour`:00 local time in `tz`.
fn resolve_local(tz: Tz, day: NaiveDate, hour: u32) -> DateTime<Utc> {
    let local = day.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN));
    match tz.from_local_datetime(&local) {
        LocalResult::Single(instant) | LocalResult::Ambiguous(instant, _) => {
            instant.with_timezone(&Utc)
        }
        LocalResult::None => after_gap(tz, local),
    }
}

/// First valid instant after a local time skipped by a DST gap.
fn after_gap(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    let steps = 24 * 60 / GAP_STEP_MINUTES;
    (1..=steps)
        .find_map(|step| {
            let candidate = local.checked_add_signed(TimeDelta::minutes(step * GAP_STEP_MINUTES))?;
            tz.from_local_datetime(&candidate).earliest()
        })
        .map_or_else(|| local.and_utc(), |instant| instant.with_timezone(&Utc))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use content_pipeline_testing::FixedClock;
    use proptest::prelude::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn toronto_weekly() -> CadenceConfig {
        CadenceConfig::new(7, 9, "America/Toronto", 48).unwrap()
    }

    #[test]
    fn tuesday_morning_in_toronto_lands_on_grid_thursday() {
        // Tuesday 2026-10-13 10:00 EDT
        let now = utc(2026, 10, 13, 14, 0);
        let slot = compute_next_slots(now, &toronto_weekly());

        assert_eq!(slot.publish_at, utc(2026, 10, 22, 13, 0));
        assert_eq!(slot.create_at, slot.publish_at - TimeDelta::hours(48));
        assert_eq!(slot.remind_at, None);

        let local = slot.publish_at.with_timezone(&chrono_tz::America::Toronto);
        assert_eq!(local.hour(), 9);
        assert_eq!(days_since_epoch(local.date_naive()) % 7, 0);
    }

    #[test]
    fn same_day_before_publish_hour_keeps_today_when_aligned() {
        let config = CadenceConfig::new(1, 9, "UTC", 1).unwrap();
        let slot = compute_next_slots(utc(2026, 5, 1, 8, 59), &config);
        assert_eq!(slot.publish_at, utc(2026, 5, 1, 9, 0));
    }

    #[test]
    fn exactly_at_publish_instant_moves_on() {
        let config = CadenceConfig::new(1, 9, "UTC", 1).unwrap();
        let slot = compute_next_slots(utc(2026, 5, 1, 9, 0), &config);
        assert_eq!(slot.publish_at, utc(2026, 5, 2, 9, 0));
    }

    #[test]
    fn upcoming_slots_cross_dst_end_at_local_nine() {
        let slots: Vec<Slot> = upcoming_slots(utc(2026, 10, 13, 14, 0), &toronto_weekly(), 3).collect();
        let publish: Vec<_> = slots.iter().map(|s| s.publish_at).collect();
        assert_eq!(
            publish,
            vec![utc(2026, 10, 22, 13, 0), utc(2026, 10, 29, 13, 0), utc(2026, 11, 5, 14, 0)]
        );
    }

    #[test]
    fn publish_hour_in_spring_gap_resolves_after_the_gap() {
        // 2026-03-08 02:00 does not exist in Toronto; clocks jump to 03:00 EDT.
        let config = CadenceConfig::new(1, 2, "America/Toronto", 1).unwrap();
        let slot = compute_next_slots(utc(2026, 3, 7, 12, 0), &config);
        assert_eq!(slot.publish_at, utc(2026, 3, 8, 7, 0));
    }

    #[test]
    fn ambiguous_publish_hour_resolves_to_earlier_instant() {
        // 2026-11-01 01:00 happens twice in Toronto; the EDT one comes first.
        let config = CadenceConfig::new(1, 1, "America/Toronto", 1).unwrap();
        let slot = compute_next_slots(utc(2026, 10, 31, 12, 0), &config);
        assert_eq!(slot.publish_at, utc(2026, 11, 1, 5, 0));
    }

    #[test]
    fn reminder_lead_is_applied() {
        let config = toronto_weekly().with_reminder_lead_hours(3);
        let slot = compute_next_slots(utc(2026, 10, 13, 14, 0), &config);
        assert_eq!(slot.remind_at, Some(slot.publish_at - TimeDelta::hours(3)));
    }

    #[test]
    fn upcoming_slots_restart_and_size() {
        let mut slots = upcoming_slots(utc(2026, 1, 1, 0, 0), &toronto_weekly(), 5);
        assert_eq!(slots.len(), 5);
        let first_pass: Vec<Slot> = slots.by_ref().collect();
        assert_eq!(slots.next(), None);

        slots.restart();
        let second_pass: Vec<Slot> = slots.collect();
        assert_eq!(first_pass, second_pass);
    }

    #[test]
    fn scheduler_uses_injected_clock() {
        let config = toronto_weekly();
        let draft_time = utc(2026, 10, 20, 13, 0);

        let before = CadenceScheduler::new(Arc::new(FixedClock::new(draft_time - TimeDelta::minutes(1))));
        assert_eq!(before.next_slots(&config).create_at, draft_time);
        assert!(!before.should_create_draft(&config));

        // Thursday 08:00 local, one hour before the slot.
        let due = CadenceScheduler::new(Arc::new(FixedClock::new(utc(2026, 10, 22, 12, 0))));
        assert_eq!(due.next_slots(&config).publish_at, utc(2026, 10, 22, 13, 0));
        assert!(due.should_create_draft(&config));
        assert_eq!(due.upcoming_slots(&config, 2).count(), 2);
    }

    #[test]
    fn past_publish_hour_skips_a_full_interval_before_aligning() {
        // At the draft instant itself (Tuesday 09:00 local) the candidate day
        // moves a whole interval ahead, so the following grid day is chosen.
        let slot = compute_next_slots(utc(2026, 10, 20, 13, 0), &toronto_weekly());
        assert_eq!(slot.publish_at, utc(2026, 10, 29, 13, 0));
    }

    #[test]
    fn largest_accepted_settings_compute_without_overflow() {
        use content_pipeline_core::cadence::{MAX_INTERVAL_DAYS, MAX_LEAD_HOURS};

        let config = CadenceConfig::new(MAX_INTERVAL_DAYS, 23, "America/Toronto", MAX_LEAD_HOURS)
            .unwrap()
            .with_reminder_lead_hours(MAX_LEAD_HOURS);
        let now = utc(2026, 10, 13, 10, 0);

        let slot = compute_next_slots(now, &config);
        assert!(slot.publish_at > now);
        assert_eq!(slot.create_at, slot.publish_at - TimeDelta::hours(MAX_LEAD_HOURS));
        assert_eq!(slot.remind_at, Some(slot.create_at));
        assert_eq!(upcoming_slots(now, &config, 3).count(), 3);
    }

    #[test]
    fn lead_before_the_earliest_instant_saturates() {
        let config = CadenceConfig::new(1, 0, "UTC", 48).unwrap();
        let slot = slot_for(DateTime::<Utc>::MIN_UTC, &config);
        assert_eq!(slot.create_at, DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn gap_search_at_the_end_of_the_calendar_does_not_overflow() {
        let local = NaiveDate::MAX.and_hms_opt(23, 0, 0).unwrap();
        let _ = after_gap(chrono_tz::America::Toronto, local);
    }

    #[test]
    fn next_slot_with_due_reads_the_clock_once() {
        let config = toronto_weekly();
        for now in [utc(2026, 10, 20, 12, 59), utc(2026, 10, 20, 13, 0), utc(2026, 10, 22, 12, 0)] {
            let scheduler = CadenceScheduler::new(Arc::new(FixedClock::new(now)));
            let (slot, due) = scheduler.next_slot_with_due(&config);
            assert_eq!(slot, compute_next_slots(now, &config));
            assert_eq!(due, should_create_draft_at(now, &config));
        }
    }

    const ZONES: &[&str] = &[
        "UTC",
        "America/Toronto",
        "Europe/Berlin",
        "Australia/Lord_Howe",
        "Asia/Kolkata",
        "America/Santiago",
    ];

    fn config_strategy() -> impl Strategy<Value = CadenceConfig> {
        (1_i64..=30, 0_i64..=23, 0..ZONES.len(), 1_i64..=200).prop_filter_map(
            "draft lead must stay inside one interval",
            |(interval, hour, zone, lead)| {
                // Leave two hours of slack for DST shifts between grid days.
                if lead > interval * 24 - 2 {
                    return None;
                }
                CadenceConfig::new(interval, hour, ZONES[zone], lead).ok()
            },
        )
    }

    fn instant_strategy() -> impl Strategy<Value = DateTime<Utc>> {
        // 2000-01-01 .. 2040-01-01
        (946_684_800_i64..2_208_988_800).prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap())
    }

    proptest! {
        #[test]
        fn next_slot_is_in_the_future_and_on_the_grid(now in instant_strategy(), config in config_strategy()) {
            let slot = compute_next_slots(now, &config);
            prop_assert!(slot.publish_at > now);

            let local = slot.publish_at.with_timezone(&config.time_zone());
            let interval = i64::from(config.interval_days());
            prop_assert_eq!(days_since_epoch(local.date_naive()).rem_euclid(interval), 0);
        }

        #[test]
        fn recomputing_from_create_at_never_moves_earlier(now in instant_strategy(), config in config_strategy()) {
            let slot = compute_next_slots(now, &config);
            let again = compute_next_slots(slot.create_at, &config);
            prop_assert!(again.publish_at >= slot.publish_at);
        }

        #[test]
        fn five_upcoming_slots_are_increasing_and_one_interval_apart(now in instant_strategy(), config in config_strategy()) {
            let slots: Vec<Slot> = upcoming_slots(now, &config, 5).collect();
            prop_assert_eq!(slots.len(), 5);

            let tz = config.time_zone();
            for pair in slots.windows(2) {
                prop_assert!(pair[1].publish_at > pair[0].publish_at);
                let gap = days_since_epoch(pair[1].publish_at.with_timezone(&tz).date_naive())
                    - days_since_epoch(pair[0].publish_at.with_timezone(&tz).date_naive());
                prop_assert_eq!(gap, i64::from(config.interval_days()));
            }
        }
    }
}
