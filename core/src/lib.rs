//! # Content Pipeline Core
//!
//! Core types and collaborator traits for the content lifecycle engine.
//!
//! This crate holds everything the engine needs to talk about without doing any
//! I/O itself:
//!
//! - **Domain types**: [`Idea`](types::Idea), [`Post`](types::Post) and the
//!   inputs that create or mutate them
//! - **Statuses**: [`PostStatus`](status::PostStatus) with its transition
//!   table, [`IdeaStatus`](status::IdeaStatus), [`Priority`](status::Priority)
//! - **Cadence**: [`CadenceSettings`](cadence::CadenceSettings) as supplied by
//!   callers and the validated [`CadenceConfig`](cadence::CadenceConfig)
//! - **Collaborators**: the [`DocumentStore`](store::DocumentStore) and
//!   [`Notifier`](notify::Notifier) traits
//! - **Environment**: the [`Clock`](environment::Clock) used for every
//!   timestamp the engine writes
//!
//! ## Architecture Principles
//!
//! - Dependency injection via explicitly constructed services
//! - Explicit side effects (no hidden I/O in the decision logic)
//! - Typed errors that propagate unchanged to the caller

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod cadence;
pub mod error;
pub mod notify;
pub mod status;
pub mod store;
pub mod types;

/// Environment module - Dependency injection traits
///
/// All time-dependent behavior in the engine reads the current instant through
/// [`Clock`](environment::Clock), so tests can pin or advance time.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use content_pipeline_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let earlier = clock.now();
    /// assert!(clock.now() >= earlier);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use error::{EntityKind, LifecycleError};
pub use status::{IdeaStatus, ParseStatusError, PostStatus, Priority};
