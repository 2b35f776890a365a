//! Errors raised by lifecycle operations.

use crate::status::PostStatus;
use crate::store::StoreError;
use std::fmt;
use thiserror::Error;

/// Kind of entity an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    /// An idea
    Idea,
    /// A post
    Post,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idea => f.write_str("Idea"),
            Self::Post => f.write_str("Post"),
        }
    }
}

/// Errors returned by the lifecycle engine.
///
/// Every variant propagates unchanged to the caller; the HTTP layer maps them
/// to status codes (404, 409, 422, ...).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// Referenced idea or post does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind
        kind: EntityKind,
        /// Requested id
        id: String,
    },

    /// Requested status change is not in the transition table.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: PostStatus,
        /// Requested status
        to: PostStatus,
    },

    /// Operation precondition not met (e.g. publishing an unapproved post).
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Operation conflicts with a protected state (deleting a published post,
    /// reusing a used idea).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Input validation failure. Reserved for the upstream validation layer.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The document store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LifecycleError {
    /// Shorthand for a missing post.
    #[must_use]
    pub fn post_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: EntityKind::Post,
            id: id.into(),
        }
    }

    /// Shorthand for a missing idea.
    #[must_use]
    pub fn idea_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: EntityKind::Idea,
            id: id.into(),
        }
    }

    /// Stable machine-readable code for the error kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::InvalidOperation(_) => "INVALID_OPERATION",
            Self::Conflict(_) => "CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}
