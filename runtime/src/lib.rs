//! # Content Pipeline Runtime
//!
//! The content lifecycle engine.
//!
//! ## Core Components
//!
//! - **[`LifecycleStateMachine`]**: validates and persists post status
//!   transitions, keeps ideas in step with their posts and emits effects
//! - **[`CadenceScheduler`]**: computes publish slots and draft-creation
//!   instants on a day grid in an IANA time zone
//! - **[`TagCache`]**: in-process TTL cache with tag-based bulk invalidation
//! - **[`ContentLifecycleService`]**: the facade that runs the state machine,
//!   invalidates cached read views and dispatches effects
//!
//! ## Example
//!
//! ```ignore
//! use content_pipeline_runtime::{ContentLifecycleService, TagCache};
//! use content_pipeline_core::{PostStatus, environment::SystemClock};
//!
//! let clock = Arc::new(SystemClock);
//! let service = ContentLifecycleService::new(
//!     store,
//!     TagCache::new(clock.clone()),
//!     notifier,
//!     clock,
//! );
//!
//! let outcome = service.transition(&post_id, PostStatus::NeedsReview).await?;
//! ```

pub mod bootstrap;
pub mod cache;
pub mod cadence;
pub mod config;
pub mod lifecycle;
pub mod repository;
pub mod service;

pub use bootstrap::{Application, build_notifier, build_service};
pub use cache::{CacheOptions, CacheStats, IDEAS_TAG, POSTS_TAG, TagCache};
pub use cadence::{CadenceScheduler, compute_next_slots, should_create_draft_at, upcoming_slots};
pub use config::Config;
pub use lifecycle::{IdeaSync, LifecycleEffect, LifecycleStateMachine, TransitionOutcome};
pub use repository::Repository;
pub use service::{
    BatchPublishReport, CadenceTick, ContentLifecycleService, IdeaFilter, IdeaStats, PostFilter,
    PostStats, PublishAttempt,
};
