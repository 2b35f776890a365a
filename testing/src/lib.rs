//! # Content Pipeline Testing
//!
//! Testing utilities and helpers for the content lifecycle engine.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - An in-memory [`DocumentStore`](content_pipeline_core::store::DocumentStore)
//!   with fault injection ([`InMemoryDocumentStore`])
//! - Notifier doubles ([`RecordingNotifier`], [`FailingNotifier`])
//! - Fixture builders for ideas and posts in any lifecycle status
//!
//! ## Example
//!
//! ```ignore
//! use content_pipeline_testing::{test_clock, InMemoryDocumentStore, RecordingNotifier};
//!
//! #[tokio::test]
//! async fn publishes_an_approved_post() {
//!     let store = InMemoryDocumentStore::new();
//!     let service = ContentLifecycleService::new(
//!         Arc::new(store.clone()),
//!         TagCache::new(Arc::new(test_clock())),
//!         Arc::new(RecordingNotifier::new()),
//!         Arc::new(test_clock()),
//!     );
//!     // ...
//! }
//! ```

use chrono::{DateTime, Utc};
use content_pipeline_core::environment::Clock;

pub mod fixtures;
pub mod notifier;
pub mod store;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chrono::TimeDelta;
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use content_pipeline_testing::mocks::FixedClock;
    /// use content_pipeline_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same underlying time, so a test can keep one handle
    /// and hand another to the code under test.
    ///
    /// # Example
    ///
    /// ```
    /// use content_pipeline_testing::mocks::ManualClock;
    /// use content_pipeline_core::environment::Clock;
    /// use chrono::{TimeDelta, Utc};
    ///
    /// let clock = ManualClock::new(Utc::now());
    /// let start = clock.now();
    /// clock.advance(TimeDelta::seconds(10));
    /// assert_eq!(clock.now() - start, TimeDelta::seconds(10));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward (or backward, with a negative delta)
        pub fn advance(&self, delta: TimeDelta) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += delta;
        }

        /// Jump to an absolute instant
        pub fn set(&self, instant: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = instant;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }

    /// The instant [`test_clock`] is pinned to.
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock, test_epoch};
pub use notifier::{FailingNotifier, RecordingNotifier};
pub use store::{FailOn, InMemoryDocumentStore};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(test_epoch());
        let handle = clock.clone();
        handle.advance(TimeDelta::minutes(5));
        assert_eq!(clock.now(), test_epoch() + TimeDelta::minutes(5));
    }
}
