//! Lifecycle statuses for posts and ideas.
//!
//! [`PostStatus`] owns the transition table. The table is the single source of
//! truth for legality: explicit status requests and derived advances are both
//! checked against it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Authoring stage of a post.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
    /// Initial stage, assigned at creation
    Brief,
    /// Outline written
    Outline,
    /// Full draft written
    Draft,
    /// Waiting for a human reviewer
    NeedsReview,
    /// Reviewed and accepted
    Approved,
    /// Accepted and queued for a publish slot
    Scheduled,
    /// Live
    Published,
    /// Sent back for regeneration
    Regenerate,
}

impl PostStatus {
    /// Every status, in authoring order.
    pub const ALL: [Self; 8] = [
        Self::Brief,
        Self::Outline,
        Self::Draft,
        Self::NeedsReview,
        Self::Approved,
        Self::Scheduled,
        Self::Published,
        Self::Regenerate,
    ];

    /// Statuses reachable from `self`.
    ///
    /// Same-status moves are only legal where listed (`Published → Published`).
    #[must_use]
    pub const fn allowed_transitions(self) -> &'static [Self] {
        match self {
            Self::Brief => &[Self::Outline, Self::Draft, Self::Regenerate],
            Self::Outline => &[Self::Draft, Self::Brief, Self::Regenerate, Self::NeedsReview],
            Self::Draft => &[Self::NeedsReview, Self::Outline, Self::Regenerate],
            Self::NeedsReview => &[Self::Approved, Self::Draft, Self::Regenerate],
            Self::Approved => &[Self::Scheduled, Self::Published, Self::Draft, Self::Regenerate],
            Self::Scheduled => &[Self::Published, Self::Approved, Self::Regenerate],
            Self::Published => &[Self::Published, Self::Regenerate],
            Self::Regenerate => &[Self::Brief, Self::Outline, Self::Draft, Self::NeedsReview],
        }
    }

    /// Returns `true` if moving from `self` to `target` is in the table.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        self.allowed_transitions().contains(&target)
    }

    /// Returns `true` if a post in this status may be published directly.
    #[must_use]
    pub const fn is_publishable(self) -> bool {
        matches!(self, Self::Approved | Self::Scheduled)
    }

    /// Wire name of the status (as persisted).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Brief => "BRIEF",
            Self::Outline => "OUTLINE",
            Self::Draft => "DRAFT",
            Self::NeedsReview => "NEEDS_REVIEW",
            Self::Approved => "APPROVED",
            Self::Scheduled => "SCHEDULED",
            Self::Published => "PUBLISHED",
            Self::Regenerate => "REGENERATE",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status name that matches no [`PostStatus`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown post status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for PostStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// Lifecycle of an idea.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdeaStatus {
    /// Available to be picked
    Unused,
    /// Held by a picker
    Processing,
    /// Consumed by a published post (terminal)
    Used,
}

impl IdeaStatus {
    /// Every status.
    pub const ALL: [Self; 3] = [Self::Unused, Self::Processing, Self::Used];

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unused => "UNUSED",
            Self::Processing => "PROCESSING",
            Self::Used => "USED",
        }
    }
}

impl fmt::Display for IdeaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Idea priority. Ordered so that `High` sorts first.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Pick first
    High,
    /// Default priority
    #[default]
    Medium,
    /// Pick last
    Low,
}

impl Priority {
    /// Every priority, highest first.
    pub const ALL: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    /// Wire name of the priority.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
