//! Domain types for the content pipeline.
//!
//! Records serialize with camelCase field names and epoch-millisecond
//! timestamps, which is the persisted shape the document store sees.

use crate::status::{IdeaStatus, PostStatus, Priority};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an idea
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdeaId(String);

impl IdeaId {
    /// Generate a fresh random id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for IdeaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IdeaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdeaId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for IdeaId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Unique identifier for a post
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    /// Generate a fresh random id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PostId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PostId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A content idea waiting to become a post.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
    /// Identity
    pub id: IdeaId,
    /// What the post should be about
    pub topic: String,
    /// Target reader
    pub persona: Option<String>,
    /// What the post should achieve
    pub goal: Option<String>,
    /// Pick order
    pub priority: Priority,
    /// Free-form difficulty label
    pub difficulty: Option<String>,
    /// Lifecycle status
    pub status: IdeaStatus,
    /// Taxonomy labels
    #[serde(default)]
    pub tags: Vec<String>,
    /// Set once a post built from this idea received its outline
    #[serde(default)]
    pub brief_created: bool,
    /// Post that consumed the idea, when known
    #[serde(default)]
    pub post_id: Option<PostId>,
    /// When the idea became `USED`
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub used_at: Option<DateTime<Utc>>,
    /// Creation instant
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Last mutation instant
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Idea {
    /// Build a fresh `UNUSED` idea from caller input.
    #[must_use]
    pub fn new(id: IdeaId, input: NewIdea, now: DateTime<Utc>) -> Self {
        Self {
            id,
            topic: input.topic,
            persona: input.persona,
            goal: input.goal,
            priority: input.priority,
            difficulty: input.difficulty,
            status: IdeaStatus::Unused,
            tags: input.tags,
            brief_created: false,
            post_id: None,
            used_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Caller input for creating an idea.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewIdea {
    /// What the post should be about
    pub topic: String,
    /// Target reader
    pub persona: Option<String>,
    /// What the post should achieve
    pub goal: Option<String>,
    /// Pick order
    pub priority: Priority,
    /// Free-form difficulty label
    pub difficulty: Option<String>,
    /// Taxonomy labels
    pub tags: Vec<String>,
}

impl NewIdea {
    /// Idea input with just a topic and priority.
    #[must_use]
    pub fn new(topic: impl Into<String>, priority: Priority) -> Self {
        Self {
            topic: topic.into(),
            priority,
            ..Self::default()
        }
    }
}

/// An image or other asset attached to a post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    /// Asset location
    pub url: String,
    /// Alternative text
    #[serde(default)]
    pub alt: Option<String>,
    /// Caption
    #[serde(default)]
    pub caption: Option<String>,
}

/// A post moving through the authoring stages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Identity
    pub id: PostId,
    /// Originating idea
    #[serde(default)]
    pub idea_id: Option<IdeaId>,
    /// Working title
    #[serde(default)]
    pub title: Option<String>,
    /// URL slug
    #[serde(default)]
    pub slug: Option<String>,
    /// Lifecycle status
    pub status: PostStatus,
    /// Advisory target publish instant; overwritten at publish time
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// First publish instant
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub published_at: Option<DateTime<Utc>>,
    /// Creation instant
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Last mutation instant
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    /// Brief stage payload
    #[serde(default)]
    pub brief: Option<Value>,
    /// Outline stage payload
    #[serde(default)]
    pub outline: Option<Value>,
    /// Draft stage payload
    #[serde(default)]
    pub draft: Option<Value>,
    /// SEO stage payload
    #[serde(default)]
    pub seo: Option<Value>,
    /// Attached media
    #[serde(default)]
    pub media: Vec<MediaItem>,
    /// Taxonomy labels
    #[serde(default)]
    pub tags: Vec<String>,
    /// Taxonomy category
    #[serde(default)]
    pub category: Option<String>,
    /// Public URL once published
    #[serde(default)]
    pub public_url: Option<String>,
    /// Rendered HTML once published
    #[serde(default)]
    pub html: Option<String>,
    /// Last automation error, if any
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Post {
    /// Build a fresh post. The status is always [`PostStatus::Brief`],
    /// whatever the input asked for, and every content stage starts empty.
    #[must_use]
    pub fn new(id: PostId, input: NewPost, now: DateTime<Utc>) -> Self {
        Self {
            id,
            idea_id: input.idea_id,
            title: input.title,
            slug: input.slug,
            status: PostStatus::Brief,
            scheduled_at: input.scheduled_at,
            published_at: None,
            created_at: now,
            updated_at: now,
            brief: None,
            outline: None,
            draft: None,
            seo: None,
            media: Vec::new(),
            tags: input.tags,
            category: input.category,
            public_url: None,
            html: None,
            error_message: None,
        }
    }

    /// Text searched by free-text filters: title, slug and the string content
    /// of every stage payload.
    #[must_use]
    pub fn searchable_text(&self) -> String {
        let mut text = String::new();
        for part in [self.title.as_deref(), self.slug.as_deref()].into_iter().flatten() {
            text.push_str(part);
            text.push('\n');
        }
        for stage in [&self.brief, &self.outline, &self.draft, &self.seo]
            .into_iter()
            .flatten()
        {
            collect_strings(stage, &mut text);
        }
        text
    }
}

fn collect_strings(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push_str(s);
            out.push('\n');
        }
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, out)),
        _ => {}
    }
}

/// Caller input for creating a post.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPost {
    /// Originating idea
    pub idea_id: Option<IdeaId>,
    /// Working title
    pub title: Option<String>,
    /// URL slug
    pub slug: Option<String>,
    /// Requested status. Ignored: posts always start at `BRIEF`.
    pub status: Option<PostStatus>,
    /// Advisory target publish instant
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Taxonomy labels
    pub tags: Vec<String>,
    /// Taxonomy category
    pub category: Option<String>,
}

/// Partial update of a post through the generic update path.
///
/// `None` leaves a field untouched. `status` is an explicit transition request
/// and goes through the transition table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostUpdate {
    /// Explicit status request
    pub status: Option<PostStatus>,
    /// Working title
    pub title: Option<String>,
    /// URL slug
    pub slug: Option<String>,
    /// Brief stage payload
    pub brief: Option<Value>,
    /// Outline stage payload
    pub outline: Option<Value>,
    /// Draft stage payload
    pub draft: Option<Value>,
    /// SEO stage payload
    pub seo: Option<Value>,
    /// Attached media (replaces the list)
    pub media: Option<Vec<MediaItem>>,
    /// Taxonomy labels (replaces the list)
    pub tags: Option<Vec<String>>,
    /// Taxonomy category
    pub category: Option<String>,
    /// Advisory target publish instant
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Public URL
    pub public_url: Option<String>,
    /// Rendered HTML
    pub html: Option<String>,
    /// Automation error message
    pub error_message: Option<String>,
}

impl PostUpdate {
    /// Update carrying only an explicit status request.
    #[must_use]
    pub fn status(status: PostStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Returns `true` if the update carries outline content.
    #[must_use]
    pub const fn has_outline(&self) -> bool {
        self.outline.is_some()
    }

    /// Copy every provided content field onto `post`. Status and timestamps
    /// are not touched here.
    pub fn apply_content(&self, post: &mut Post) {
        if let Some(title) = &self.title {
            post.title = Some(title.clone());
        }
        if let Some(slug) = &self.slug {
            post.slug = Some(slug.clone());
        }
        if let Some(brief) = &self.brief {
            post.brief = Some(brief.clone());
        }
        if let Some(outline) = &self.outline {
            post.outline = Some(outline.clone());
        }
        if let Some(draft) = &self.draft {
            post.draft = Some(draft.clone());
        }
        if let Some(seo) = &self.seo {
            post.seo = Some(seo.clone());
        }
        if let Some(media) = &self.media {
            post.media = media.clone();
        }
        if let Some(tags) = &self.tags {
            post.tags = tags.clone();
        }
        if let Some(category) = &self.category {
            post.category = Some(category.clone());
        }
        if let Some(scheduled_at) = self.scheduled_at {
            post.scheduled_at = Some(scheduled_at);
        }
        if let Some(public_url) = &self.public_url {
            post.public_url = Some(public_url.clone());
        }
        if let Some(html) = &self.html {
            post.html = Some(html.clone());
        }
        if let Some(error_message) = &self.error_message {
            post.error_message = Some(error_message.clone());
        }
    }
}
