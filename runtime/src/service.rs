//! Service facade over the lifecycle engine.
//!
//! [`ContentLifecycleService`] is what the HTTP layer talks to. It runs the
//! state machine, drops the cache tags of whatever entity kind an operation
//! touched, and executes the effects a transition asks for.
//!
//! Reads are cache-aside: list and stat views are cached under keys derived
//! from their filter and tagged with [`POSTS_TAG`] or [`IDEAS_TAG`]. Any
//! mutation of that entity kind drops every view under the tag.

use crate::cache::{CacheOptions, IDEAS_TAG, POSTS_TAG, TagCache};
use crate::cadence::CadenceScheduler;
use crate::lifecycle::{LifecycleEffect, LifecycleStateMachine, TransitionOutcome};
use chrono::{DateTime, Utc};
use content_pipeline_core::cadence::{CadenceConfig, Slot};
use content_pipeline_core::environment::Clock;
use content_pipeline_core::error::LifecycleError;
use content_pipeline_core::notify::Notifier;
use content_pipeline_core::store::{Direction, DocumentStore, FilterOp, Query};
use content_pipeline_core::types::{Idea, IdeaId, NewIdea, NewPost, Post, PostId, PostUpdate};
use content_pipeline_core::{IdeaStatus, PostStatus, Priority};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Residual filter for post listings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostFilter {
    /// Keep posts in any of these statuses (empty keeps all)
    pub statuses: Vec<PostStatus>,
    /// Keep posts carrying at least one of these tags (empty keeps all)
    pub tags: Vec<String>,
    /// Case-insensitive substring over title, slug and stage content
    pub search: Option<String>,
    /// Keep posts built from this idea
    pub idea_id: Option<IdeaId>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl PostFilter {
    /// Filter on a single status.
    #[must_use]
    pub fn status(status: PostStatus) -> Self {
        Self {
            statuses: vec![status],
            ..Self::default()
        }
    }

    fn base_query(&self) -> Query {
        let mut query = Query::new().order_by("createdAt", Direction::Descending);
        if let [status] = self.statuses.as_slice() {
            query = query.where_eq("status", Value::from(status.as_str()));
        }
        if let Some(idea_id) = &self.idea_id {
            query = query.where_eq("ideaId", Value::from(idea_id.as_str()));
        }
        query
    }

    fn matches(&self, post: &Post) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&post.status))
            && tags_overlap(&self.tags, &post.tags)
            && self
                .search
                .as_deref()
                .is_none_or(|needle| contains_ignore_case(&post.searchable_text(), needle))
    }

    fn cache_key(&self) -> String {
        format!("posts:list:{self:?}")
    }
}

/// Residual filter for idea listings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdeaFilter {
    /// Keep ideas in any of these statuses (empty keeps all)
    pub statuses: Vec<IdeaStatus>,
    /// Keep ideas with any of these priorities (empty keeps all)
    pub priorities: Vec<Priority>,
    /// Keep ideas carrying at least one of these tags (empty keeps all)
    pub tags: Vec<String>,
    /// Case-insensitive substring over topic, persona and goal
    pub search: Option<String>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl IdeaFilter {
    fn base_query(&self) -> Query {
        let mut query = Query::new().order_by("createdAt", Direction::Descending);
        if let [status] = self.statuses.as_slice() {
            query = query.where_eq("status", Value::from(status.as_str()));
        }
        query
    }

    fn matches(&self, idea: &Idea) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&idea.status))
            && (self.priorities.is_empty() || self.priorities.contains(&idea.priority))
            && tags_overlap(&self.tags, &idea.tags)
            && self.search.as_deref().is_none_or(|needle| {
                [Some(idea.topic.as_str()), idea.persona.as_deref(), idea.goal.as_deref()]
                    .into_iter()
                    .flatten()
                    .any(|text| contains_ignore_case(text, needle))
            })
    }

    fn cache_key(&self) -> String {
        format!("ideas:list:{self:?}")
    }
}

fn tags_overlap(wanted: &[String], present: &[String]) -> bool {
    wanted.is_empty() || wanted.iter().any(|tag| present.contains(tag))
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Post counts per status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostStats {
    /// All posts
    pub total: usize,
    /// Count for every status, zeros included
    pub by_status: BTreeMap<PostStatus, usize>,
}

/// Idea counts per status and priority.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaStats {
    /// All ideas
    pub total: usize,
    /// Count for every status, zeros included
    pub by_status: BTreeMap<IdeaStatus, usize>,
    /// Count for every priority, zeros included
    pub by_priority: BTreeMap<Priority, usize>,
}

/// One attempt within [`ContentLifecycleService::publish_batch`].
#[derive(Clone, Debug, PartialEq)]
pub struct PublishAttempt {
    /// Post that was attempted
    pub post_id: PostId,
    /// What happened
    pub result: Result<TransitionOutcome, LifecycleError>,
}

/// Aggregate result of a batch publish.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchPublishReport {
    /// Ids attempted
    pub requested: usize,
    /// Ids that ended up `PUBLISHED`
    pub succeeded: usize,
    /// Ids that failed
    pub failed: usize,
    /// Per-id results, in request order
    pub outcomes: Vec<PublishAttempt>,
}

/// What a cadence tick did.
#[derive(Clone, Debug, PartialEq)]
pub enum CadenceTick {
    /// The next slot's draft-creation instant has not arrived yet.
    NotDue {
        /// Next slot
        slot: Slot,
    },
    /// A post already targets the next slot.
    AlreadyPlanned {
        /// Next slot
        slot: Slot,
        /// Post scheduled for it
        post_id: PostId,
    },
    /// A draft is due but no idea is `UNUSED`.
    NoIdeaAvailable {
        /// Next slot
        slot: Slot,
    },
    /// A post was created for the next slot.
    Created {
        /// Next slot
        slot: Slot,
        /// Idea that was picked
        idea: Idea,
        /// New `BRIEF` post
        post: Post,
    },
}

/// Orchestrates the state machine, the tag cache, the store and the notifier.
#[derive(Clone)]
pub struct ContentLifecycleService {
    machine: LifecycleStateMachine,
    cache: TagCache,
    notifier: Arc<dyn Notifier>,
    scheduler: CadenceScheduler,
}

impl fmt::Debug for ContentLifecycleService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentLifecycleService")
            .field("machine", &self.machine)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl ContentLifecycleService {
    /// Wire the service from its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache: TagCache,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            machine: LifecycleStateMachine::new(store, Arc::clone(&clock)),
            cache,
            notifier,
            scheduler: CadenceScheduler::new(clock),
        }
    }

    /// The underlying state machine
    #[must_use]
    pub const fn machine(&self) -> &LifecycleStateMachine {
        &self.machine
    }

    /// The read-view cache
    #[must_use]
    pub const fn cache(&self) -> &TagCache {
        &self.cache
    }

    /// The clock-bound cadence scheduler
    #[must_use]
    pub const fn scheduler(&self) -> &CadenceScheduler {
        &self.scheduler
    }

    // ----- Ideas -----

    /// Create an idea.
    ///
    /// # Errors
    ///
    /// See [`LifecycleStateMachine::create_idea`].
    #[tracing::instrument(skip_all)]
    pub async fn create_idea(&self, input: NewIdea) -> Result<Idea, LifecycleError> {
        let result = self.machine.create_idea(input).await;
        self.invalidate(&[IDEAS_TAG]);
        result
    }

    /// Pick the next idea and mark it `PROCESSING`.
    ///
    /// # Errors
    ///
    /// See [`LifecycleStateMachine::pick_next_idea`].
    #[tracing::instrument(skip_all)]
    pub async fn pick_next_idea(&self) -> Result<Option<Idea>, LifecycleError> {
        let result = self.machine.pick_next_idea().await;
        self.invalidate(&[IDEAS_TAG]);
        result
    }

    /// Mark an idea `USED`.
    ///
    /// # Errors
    ///
    /// See [`LifecycleStateMachine::mark_idea_used`].
    #[tracing::instrument(skip_all, fields(idea_id = %id))]
    pub async fn mark_idea_used(
        &self,
        id: &IdeaId,
        post_id: Option<PostId>,
    ) -> Result<Idea, LifecycleError> {
        let result = self.machine.mark_idea_used(id, post_id).await;
        self.invalidate(&[IDEAS_TAG]);
        result
    }

    /// Return a held idea to the pool.
    ///
    /// # Errors
    ///
    /// See [`LifecycleStateMachine::release_idea`].
    #[tracing::instrument(skip_all, fields(idea_id = %id))]
    pub async fn release_idea(&self, id: &IdeaId) -> Result<Idea, LifecycleError> {
        let result = self.machine.release_idea(id).await;
        self.invalidate(&[IDEAS_TAG]);
        result
    }

    /// Delete an idea that is not `USED`.
    ///
    /// # Errors
    ///
    /// See [`LifecycleStateMachine::delete_idea`].
    #[tracing::instrument(skip_all, fields(idea_id = %id))]
    pub async fn delete_idea(&self, id: &IdeaId) -> Result<(), LifecycleError> {
        let result = self.machine.delete_idea(id).await;
        self.invalidate(&[IDEAS_TAG]);
        result
    }

    // ----- Posts -----

    /// Create a post in `BRIEF`.
    ///
    /// # Errors
    ///
    /// See [`LifecycleStateMachine::create_post`].
    #[tracing::instrument(skip_all)]
    pub async fn create_post(&self, input: NewPost) -> Result<Post, LifecycleError> {
        let result = self.machine.create_post(input).await;
        self.invalidate(&[POSTS_TAG]);
        result
    }

    /// Create a post from an idea.
    ///
    /// # Errors
    ///
    /// See [`LifecycleStateMachine::create_post_from_idea`].
    #[tracing::instrument(skip_all, fields(idea_id = %idea_id))]
    pub async fn create_post_from_idea(
        &self,
        idea_id: &IdeaId,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Post, LifecycleError> {
        let result = self.machine.create_post_from_idea(idea_id, scheduled_at).await;
        self.invalidate(&[POSTS_TAG, IDEAS_TAG]);
        result
    }

    /// Update a post's content and, optionally, its status.
    ///
    /// # Errors
    ///
    /// See [`LifecycleStateMachine::update_post`].
    #[tracing::instrument(skip_all, fields(post_id = %id))]
    pub async fn update_post(
        &self,
        id: &PostId,
        update: PostUpdate,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let result = self.machine.update_post(id, update).await;
        self.settle(&result);
        result
    }

    /// Move a post to `target`.
    ///
    /// # Errors
    ///
    /// See [`LifecycleStateMachine::transition`].
    #[tracing::instrument(skip_all, fields(post_id = %id, target = %target))]
    pub async fn transition(
        &self,
        id: &PostId,
        target: PostStatus,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let result = self.machine.transition(id, target).await;
        self.settle(&result);
        result
    }

    /// Publish an approved or scheduled post.
    ///
    /// # Errors
    ///
    /// See [`LifecycleStateMachine::publish_post`].
    #[tracing::instrument(skip_all, fields(post_id = %id))]
    pub async fn publish_post(&self, id: &PostId) -> Result<TransitionOutcome, LifecycleError> {
        let result = self.machine.publish_post(id).await;
        self.settle(&result);
        result
    }

    /// Publish each id independently. A failure never stops the batch.
    #[tracing::instrument(skip_all, fields(requested = ids.len()))]
    pub async fn publish_batch(&self, ids: &[PostId]) -> BatchPublishReport {
        let mut report = BatchPublishReport {
            requested: ids.len(),
            ..BatchPublishReport::default()
        };

        for id in ids {
            let result = self.publish_post(id).await;
            match &result {
                Ok(_) => report.succeeded += 1,
                Err(error) => {
                    tracing::warn!(post_id = %id, %error, "Batch publish item failed");
                    report.failed += 1;
                }
            }
            report.outcomes.push(PublishAttempt {
                post_id: id.clone(),
                result,
            });
        }

        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "Batch publish finished"
        );
        report
    }

    /// Delete a post that is not `PUBLISHED`.
    ///
    /// # Errors
    ///
    /// See [`LifecycleStateMachine::delete_post`].
    #[tracing::instrument(skip_all, fields(post_id = %id))]
    pub async fn delete_post(&self, id: &PostId) -> Result<(), LifecycleError> {
        let result = self.machine.delete_post(id).await;
        self.invalidate(&[POSTS_TAG]);
        result
    }

    // ----- Cadence -----

    /// Automation entry point: create the post for the next slot once its
    /// draft is due.
    ///
    /// If picking succeeds but the post cannot be created, the idea is
    /// released again on a best-effort basis.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Store`] on store failure, or the error from creating
    /// the post.
    #[tracing::instrument(skip_all)]
    pub async fn cadence_tick(&self, config: &CadenceConfig) -> Result<CadenceTick, LifecycleError> {
        let (slot, due) = self.scheduler.next_slot_with_due(config);
        if !due {
            tracing::debug!(publish_at = %slot.publish_at, "Draft not due yet");
            return Ok(CadenceTick::NotDue { slot });
        }

        let planned = self
            .machine
            .posts()
            .query(
                Query::new()
                    .filter("scheduledAt", FilterOp::Eq, Value::from(slot.publish_at_millis()))
                    .limit(1),
            )
            .await?;
        if let Some(existing) = planned.into_iter().next() {
            return Ok(CadenceTick::AlreadyPlanned {
                slot,
                post_id: existing.id,
            });
        }

        let Some(idea) = self.pick_next_idea().await? else {
            tracing::warn!(publish_at = %slot.publish_at, "Draft due but no idea available");
            return Ok(CadenceTick::NoIdeaAvailable { slot });
        };

        match self.create_post_from_idea(&idea.id, Some(slot.publish_at)).await {
            Ok(post) => {
                tracing::info!(
                    post_id = %post.id,
                    idea_id = %idea.id,
                    publish_at = %slot.publish_at,
                    "Draft created for next slot"
                );
                Ok(CadenceTick::Created { slot, idea, post })
            }
            Err(error) => {
                if let Err(release_error) = self.release_idea(&idea.id).await {
                    tracing::warn!(idea_id = %idea.id, error = %release_error, "Could not release idea");
                }
                Err(error)
            }
        }
    }

    // ----- Cached reads -----

    /// Load a post.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotFound`] or [`LifecycleError::Store`].
    pub async fn get_post(&self, id: &PostId) -> Result<Post, LifecycleError> {
        let key = format!("posts:one:{id}");
        self.cache
            .get_or_set(&key, CacheOptions::tagged(POSTS_TAG), || self.machine.post(id))
            .await
    }

    /// Load an idea.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotFound`] or [`LifecycleError::Store`].
    pub async fn get_idea(&self, id: &IdeaId) -> Result<Idea, LifecycleError> {
        let key = format!("ideas:one:{id}");
        self.cache
            .get_or_set(&key, CacheOptions::tagged(IDEAS_TAG), || self.machine.idea(id))
            .await
    }

    /// Posts matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Store`] on store failure.
    pub async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<Post>, LifecycleError> {
        self.cache
            .get_or_set(&filter.cache_key(), CacheOptions::tagged(POSTS_TAG), || {
                self.load_posts(filter)
            })
            .await
    }

    /// Ideas matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Store`] on store failure.
    pub async fn list_ideas(&self, filter: &IdeaFilter) -> Result<Vec<Idea>, LifecycleError> {
        self.cache
            .get_or_set(&filter.cache_key(), CacheOptions::tagged(IDEAS_TAG), || {
                self.load_ideas(filter)
            })
            .await
    }

    /// Post counts per status.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Store`] on store failure.
    pub async fn post_stats(&self) -> Result<PostStats, LifecycleError> {
        self.cache
            .get_or_set("posts:stats", CacheOptions::tagged(POSTS_TAG), || {
                self.load_post_stats()
            })
            .await
    }

    /// Idea counts per status and priority.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Store`] on store failure.
    pub async fn idea_stats(&self) -> Result<IdeaStats, LifecycleError> {
        self.cache
            .get_or_set("ideas:stats", CacheOptions::tagged(IDEAS_TAG), || {
                self.load_idea_stats()
            })
            .await
    }

    async fn load_posts(&self, filter: &PostFilter) -> Result<Vec<Post>, LifecycleError> {
        let posts = self.machine.posts().query(filter.base_query()).await?;
        Ok(posts
            .into_iter()
            .filter(|post| filter.matches(post))
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn load_ideas(&self, filter: &IdeaFilter) -> Result<Vec<Idea>, LifecycleError> {
        let ideas = self.machine.ideas().query(filter.base_query()).await?;
        Ok(ideas
            .into_iter()
            .filter(|idea| filter.matches(idea))
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn load_post_stats(&self) -> Result<PostStats, LifecycleError> {
        let posts = self.machine.posts().query(Query::new()).await?;
        let mut by_status: BTreeMap<PostStatus, usize> =
            PostStatus::ALL.iter().map(|status| (*status, 0)).collect();
        for post in &posts {
            *by_status.entry(post.status).or_default() += 1;
        }
        Ok(PostStats {
            total: posts.len(),
            by_status,
        })
    }

    async fn load_idea_stats(&self) -> Result<IdeaStats, LifecycleError> {
        let ideas = self.machine.ideas().query(Query::new()).await?;
        let mut by_status: BTreeMap<IdeaStatus, usize> =
            IdeaStatus::ALL.iter().map(|status| (*status, 0)).collect();
        let mut by_priority: BTreeMap<Priority, usize> =
            Priority::ALL.iter().map(|priority| (*priority, 0)).collect();
        for idea in &ideas {
            *by_status.entry(idea.status).or_default() += 1;
            *by_priority.entry(idea.priority).or_default() += 1;
        }
        Ok(IdeaStats {
            total: ideas.len(),
            by_status,
            by_priority,
        })
    }

    // ----- Plumbing -----

    fn invalidate(&self, tags: &[&str]) {
        for tag in tags {
            self.cache.delete_by_tag(tag);
        }
    }

    /// Invalidate after a status-changing operation and run its effects.
    fn settle(&self, result: &Result<TransitionOutcome, LifecycleError>) {
        self.invalidate(&[POSTS_TAG]);
        let Ok(outcome) = result else {
            return;
        };
        if outcome.idea_sync.is_some() {
            self.invalidate(&[IDEAS_TAG]);
        }
        for effect in &outcome.effects {
            self.dispatch(effect.clone());
        }
    }

    /// Execute an effect on a background task. The caller does not wait.
    fn dispatch(&self, effect: LifecycleEffect) {
        match effect {
            LifecycleEffect::NotifyRegenerate(notification) => {
                let notifier = Arc::clone(&self.notifier);
                tokio::spawn(async move {
                    let post_id = notification.post_id.clone();
                    match notifier.notify(notification).await {
                        Ok(()) => tracing::debug!(%post_id, "Regenerate notification delivered"),
                        Err(error) => {
                            tracing::error!(%post_id, %error, "Regenerate notification failed");
                        }
                    }
                });
            }
        }
    }
}
