//! Fixture builders for ideas and posts.
//!
//! Fixtures build records directly, bypassing the lifecycle engine, so tests
//! can start from any status.

use chrono::{DateTime, Utc};
use content_pipeline_core::types::{Idea, IdeaId, NewIdea, NewPost, Post, PostId};
use content_pipeline_core::{IdeaStatus, PostStatus, Priority};

/// An `UNUSED` idea with the given topic and priority.
#[must_use]
pub fn idea(topic: &str, priority: Priority, created_at: DateTime<Utc>) -> Idea {
    Idea::new(IdeaId::new(), NewIdea::new(topic, priority), created_at)
}

/// An idea in an arbitrary status.
#[must_use]
pub fn idea_in(status: IdeaStatus, created_at: DateTime<Utc>) -> Idea {
    let mut idea = idea("Fixture idea", Priority::Medium, created_at);
    idea.status = status;
    if status == IdeaStatus::Used {
        idea.used_at = Some(created_at);
    }
    idea
}

/// A post in an arbitrary status, keeping the `published_at` invariant.
#[must_use]
pub fn post_in(status: PostStatus, created_at: DateTime<Utc>) -> Post {
    let mut post = Post::new(PostId::new(), NewPost::default(), created_at);
    post.status = status;
    if status == PostStatus::Published {
        post.published_at = Some(created_at);
        post.scheduled_at = Some(created_at);
    }
    post
}

/// A post in `status` that back-references `idea`.
#[must_use]
pub fn post_for_idea(idea: &Idea, status: PostStatus, created_at: DateTime<Utc>) -> Post {
    let mut post = post_in(status, created_at);
    post.idea_id = Some(idea.id.clone());
    post.title = Some(idea.topic.clone());
    post
}
