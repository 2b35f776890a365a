//! Post lifecycle state machine.
//!
//! Legality lives in two pure functions, [`apply_transition`] and
//! [`derived_advance`], both checked against the transition table on
//! [`PostStatus`]. [`LifecycleStateMachine`] wraps them with store reads and
//! writes and the best-effort idea bookkeeping.
//!
//! Side effects the machine cannot perform itself are returned as
//! [`LifecycleEffect`] values in the [`TransitionOutcome`]; the service layer
//! executes them.
//!
//! Read-modify-write sequences here are not atomic. Two callers interleaving
//! at the store's await points can both act on the same snapshot; in
//! particular two concurrent [`LifecycleStateMachine::pick_next_idea`] calls
//! can hand out the same idea.

use crate::repository::Repository;
use chrono::{DateTime, Utc};
use content_pipeline_core::environment::Clock;
use content_pipeline_core::error::LifecycleError;
use content_pipeline_core::notify::LifecycleNotification;
use content_pipeline_core::store::{Direction, DocumentStore, Query};
use content_pipeline_core::types::{Idea, IdeaId, NewIdea, NewPost, Post, PostId, PostUpdate};
use content_pipeline_core::{IdeaStatus, PostStatus};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Work requested by a transition that happens outside the store write.
#[derive(Clone, Debug, PartialEq)]
pub enum LifecycleEffect {
    /// Tell the automation collaborator that a post needs regenerating.
    NotifyRegenerate(LifecycleNotification),
}

/// What happened to the owning idea as a consequence of a post transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdeaSync {
    /// The idea was flipped to `USED`.
    MarkedUsed(IdeaId),
    /// The idea was already `USED`; nothing was written.
    AlreadyUsed(IdeaId),
    /// The idea's `brief_created` flag was set.
    BriefCreated(IdeaId),
    /// The update failed and was skipped.
    Failed {
        /// Idea that could not be updated
        idea_id: IdeaId,
        /// Error description
        reason: String,
    },
}

/// Result of a status-changing operation.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionOutcome {
    /// The post as stored
    pub post: Post,
    /// Status before the operation
    pub previous_status: PostStatus,
    /// `true` if the status change was implied by content rather than
    /// requested
    pub derived: bool,
    /// Best-effort idea bookkeeping, when any was attempted
    pub idea_sync: Option<IdeaSync>,
    /// Effects to execute after the write
    pub effects: Vec<LifecycleEffect>,
}

impl TransitionOutcome {
    /// Returns `true` if the status differs from before the operation.
    #[must_use]
    pub fn status_changed(&self) -> bool {
        self.post.status != self.previous_status
    }
}

/// A transition applied to an in-memory post.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppliedTransition {
    /// Status before
    pub from: PostStatus,
    /// Status after
    pub to: PostStatus,
    /// `true` if this was the post's first entry into `PUBLISHED`
    pub first_publish: bool,
}

/// Move `post` to `target`, applying the timestamp rules.
///
/// Entering `PUBLISHED` from another status sets `scheduled_at` to `now`;
/// `published_at` is set only if it was never set before.
///
/// # Errors
///
/// Returns [`LifecycleError::InvalidTransition`] if the table does not allow
/// the move. `post` is left untouched in that case.
pub fn apply_transition(
    post: &mut Post,
    target: PostStatus,
    now: DateTime<Utc>,
) -> Result<AppliedTransition, LifecycleError> {
    let from = post.status;
    if !from.can_transition_to(target) {
        return Err(LifecycleError::InvalidTransition { from, to: target });
    }

    let first_publish = target == PostStatus::Published && post.published_at.is_none();
    if target == PostStatus::Published && from != PostStatus::Published {
        post.scheduled_at = Some(now);
    }
    if first_publish {
        post.published_at = Some(now);
    }
    post.status = target;
    post.updated_at = now;

    Ok(AppliedTransition {
        from,
        to: target,
        first_publish,
    })
}

/// Status implied by the content of `update`, if any.
///
/// Outline content arriving while the post is still in `BRIEF`, with no
/// explicit status request, advances it to `OUTLINE`.
#[must_use]
pub fn derived_advance(current: PostStatus, update: &PostUpdate) -> Option<PostStatus> {
    let explicit = update.status.filter(|status| *status != current);
    if explicit.is_some() || !update.has_outline() || current != PostStatus::Brief {
        return None;
    }
    Some(PostStatus::Outline).filter(|target| current.can_transition_to(*target))
}

/// Validates and executes post and idea lifecycle operations.
#[derive(Clone)]
pub struct LifecycleStateMachine {
    posts: Repository<Post>,
    ideas: Repository<Idea>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for LifecycleStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleStateMachine")
            .field("posts", &self.posts)
            .field("ideas", &self.ideas)
            .finish_non_exhaustive()
    }
}

impl LifecycleStateMachine {
    /// Create a state machine over `store`
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            posts: Repository::new(Arc::clone(&store)),
            ideas: Repository::new(store),
            clock,
        }
    }

    /// Post repository
    #[must_use]
    pub const fn posts(&self) -> &Repository<Post> {
        &self.posts
    }

    /// Idea repository
    #[must_use]
    pub const fn ideas(&self) -> &Repository<Idea> {
        &self.ideas
    }

    /// Load a post.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotFound`] or [`LifecycleError::Store`].
    pub async fn post(&self, id: &PostId) -> Result<Post, LifecycleError> {
        self.posts.require(id.as_str()).await
    }

    /// Load an idea.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotFound`] or [`LifecycleError::Store`].
    pub async fn idea(&self, id: &IdeaId) -> Result<Idea, LifecycleError> {
        self.ideas.require(id.as_str()).await
    }

    /// Create a post. It always starts in `BRIEF` with empty stages.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Store`] if the write fails.
    pub async fn create_post(&self, input: NewPost) -> Result<Post, LifecycleError> {
        let post = Post::new(PostId::new(), input, self.clock.now());
        self.posts.save(&post).await?;
        tracing::info!(post_id = %post.id, "Post created");
        Ok(post)
    }

    /// Create an `UNUSED` idea.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Store`] if the write fails.
    pub async fn create_idea(&self, input: NewIdea) -> Result<Idea, LifecycleError> {
        let idea = Idea::new(IdeaId::new(), input, self.clock.now());
        self.ideas.save(&idea).await?;
        tracing::info!(idea_id = %idea.id, priority = %idea.priority, "Idea created");
        Ok(idea)
    }

    /// Create a `BRIEF` post from an idea and link the idea back to it.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotFound`] if the idea is missing,
    /// [`LifecycleError::Conflict`] if it is already `USED`.
    pub async fn create_post_from_idea(
        &self,
        idea_id: &IdeaId,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Post, LifecycleError> {
        let before = self.idea(idea_id).await?;
        if before.status == IdeaStatus::Used {
            return Err(LifecycleError::Conflict(format!(
                "Idea {idea_id} has already been used"
            )));
        }

        let now = self.clock.now();
        let input = NewPost {
            idea_id: Some(before.id.clone()),
            title: Some(before.topic.clone()),
            scheduled_at,
            tags: before.tags.clone(),
            ..NewPost::default()
        };
        let post = Post::new(PostId::new(), input, now);
        self.posts.save(&post).await?;

        let mut idea = before.clone();
        idea.post_id = Some(post.id.clone());
        idea.updated_at = now;
        self.ideas.patch(&before, &idea).await?;

        tracing::info!(post_id = %post.id, idea_id = %idea_id, "Post created from idea");
        Ok(post)
    }

    /// Move a post to `target`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::InvalidTransition`] if the table forbids it (nothing
    /// is written), [`LifecycleError::NotFound`] or [`LifecycleError::Store`].
    pub async fn transition(
        &self,
        id: &PostId,
        target: PostStatus,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let post = self.post(id).await?;
        self.transition_loaded(post, target).await
    }

    /// Publish a post that is `APPROVED` or `SCHEDULED`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::InvalidOperation`] from any other status.
    pub async fn publish_post(&self, id: &PostId) -> Result<TransitionOutcome, LifecycleError> {
        let post = self.post(id).await?;
        if !post.status.is_publishable() {
            return Err(LifecycleError::InvalidOperation(format!(
                "Post {id} must be APPROVED or SCHEDULED to publish (currently {})",
                post.status
            )));
        }
        self.transition_loaded(post, PostStatus::Published).await
    }

    /// Generic update: content fields, an optional explicit status, and the
    /// derived advance when outline content reaches a `BRIEF` post.
    ///
    /// A requested status equal to the current one is treated as no request.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::InvalidTransition`] for an illegal explicit status
    /// (nothing is written), [`LifecycleError::NotFound`] or
    /// [`LifecycleError::Store`].
    pub async fn update_post(
        &self,
        id: &PostId,
        update: PostUpdate,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let before = self.post(id).await?;
        let now = self.clock.now();

        let mut post = before.clone();
        update.apply_content(&mut post);
        post.updated_at = now;

        let requested = update.status.filter(|status| *status != before.status);
        let (applied, derived) = if let Some(target) = requested {
            (Some(apply_transition(&mut post, target, now)?), false)
        } else if let Some(target) = derived_advance(before.status, &update) {
            (Some(apply_transition(&mut post, target, now)?), true)
        } else {
            (None, false)
        };

        self.posts.patch(&before, &post).await?;

        match applied {
            Some(applied) => {
                tracing::info!(
                    post_id = %post.id,
                    from = %applied.from,
                    to = %applied.to,
                    derived,
                    "Post transitioned"
                );
                Ok(self.settle(post, applied, derived, now).await)
            }
            None => {
                tracing::debug!(post_id = %post.id, "Post content updated");
                Ok(TransitionOutcome {
                    previous_status: post.status,
                    post,
                    derived: false,
                    idea_sync: None,
                    effects: Vec::new(),
                })
            }
        }
    }

    /// Hand out the next idea to work on and mark it `PROCESSING`.
    ///
    /// Ideas are ordered by priority (high first), then oldest first.
    /// Returns `None` when no idea is `UNUSED`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Store`] on store failure.
    pub async fn pick_next_idea(&self) -> Result<Option<Idea>, LifecycleError> {
        let query = Query::new()
            .where_eq("status", Value::from(IdeaStatus::Unused.as_str()))
            .order_by("createdAt", Direction::Ascending);
        let candidates = self.ideas.query(query).await?;

        let Some(before) = candidates
            .into_iter()
            .min_by_key(|idea| (idea.priority, idea.created_at))
        else {
            tracing::debug!("No unused idea to pick");
            return Ok(None);
        };

        let mut idea = before.clone();
        idea.status = IdeaStatus::Processing;
        idea.updated_at = self.clock.now();
        self.ideas.patch(&before, &idea).await?;

        tracing::info!(idea_id = %idea.id, priority = %idea.priority, "Picked next idea");
        Ok(Some(idea))
    }

    /// Mark an idea `USED`, optionally recording the post that consumed it.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Conflict`] if the idea is already `USED`.
    pub async fn mark_idea_used(
        &self,
        id: &IdeaId,
        post_id: Option<PostId>,
    ) -> Result<Idea, LifecycleError> {
        let before = self.idea(id).await?;
        if before.status == IdeaStatus::Used {
            return Err(LifecycleError::Conflict(format!("Idea {id} has already been used")));
        }

        let now = self.clock.now();
        let mut idea = before.clone();
        idea.status = IdeaStatus::Used;
        idea.used_at = Some(now);
        idea.updated_at = now;
        if post_id.is_some() {
            idea.post_id = post_id;
        }
        self.ideas.patch(&before, &idea).await?;

        tracing::info!(idea_id = %id, "Idea marked used");
        Ok(idea)
    }

    /// Return a `PROCESSING` idea to the pool. Already `UNUSED` is a no-op.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Conflict`] if the idea is `USED`.
    pub async fn release_idea(&self, id: &IdeaId) -> Result<Idea, LifecycleError> {
        let before = self.idea(id).await?;
        match before.status {
            IdeaStatus::Used => Err(LifecycleError::Conflict(format!(
                "Idea {id} has already been used and cannot be released"
            ))),
            IdeaStatus::Unused => Ok(before),
            IdeaStatus::Processing => {
                let mut idea = before.clone();
                idea.status = IdeaStatus::Unused;
                idea.updated_at = self.clock.now();
                self.ideas.patch(&before, &idea).await?;
                tracing::info!(idea_id = %id, "Idea released");
                Ok(idea)
            }
        }
    }

    /// Delete a post that is not `PUBLISHED`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Conflict`] for a published post,
    /// [`LifecycleError::NotFound`] if missing.
    pub async fn delete_post(&self, id: &PostId) -> Result<(), LifecycleError> {
        let post = self.post(id).await?;
        if post.status == PostStatus::Published {
            return Err(LifecycleError::Conflict(format!(
                "Post {id} is published and cannot be deleted"
            )));
        }
        self.posts.delete(id.as_str()).await?;
        tracing::info!(post_id = %id, status = %post.status, "Post deleted");
        Ok(())
    }

    /// Delete an idea that is not `USED`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Conflict`] for a used idea,
    /// [`LifecycleError::NotFound`] if missing.
    pub async fn delete_idea(&self, id: &IdeaId) -> Result<(), LifecycleError> {
        let idea = self.idea(id).await?;
        if idea.status == IdeaStatus::Used {
            return Err(LifecycleError::Conflict(format!(
                "Idea {id} has been used and cannot be deleted"
            )));
        }
        self.ideas.delete(id.as_str()).await?;
        tracing::info!(idea_id = %id, "Idea deleted");
        Ok(())
    }

    async fn transition_loaded(
        &self,
        before: Post,
        target: PostStatus,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let now = self.clock.now();
        let mut post = before.clone();
        let applied = apply_transition(&mut post, target, now)?;
        self.posts.patch(&before, &post).await?;

        tracing::info!(
            post_id = %post.id,
            from = %applied.from,
            to = %applied.to,
            "Post transitioned"
        );
        Ok(self.settle(post, applied, false, now).await)
    }

    /// Post-write bookkeeping shared by every status change.
    async fn settle(
        &self,
        post: Post,
        applied: AppliedTransition,
        derived: bool,
        now: DateTime<Utc>,
    ) -> TransitionOutcome {
        let idea_sync = match (&post.idea_id, applied.first_publish, derived) {
            (Some(idea_id), true, _) => Some(
                best_effort(idea_id, self.use_idea_for(idea_id, &post.id, now)).await,
            ),
            (Some(idea_id), false, true) => Some(
                best_effort(idea_id, self.flag_brief_created(idea_id, now)).await,
            ),
            _ => None,
        };

        let mut effects = Vec::new();
        if applied.to == PostStatus::Regenerate && applied.from != PostStatus::Regenerate {
            effects.push(LifecycleEffect::NotifyRegenerate(
                LifecycleNotification::regenerate(post.clone(), now),
            ));
        }

        TransitionOutcome {
            post,
            previous_status: applied.from,
            derived,
            idea_sync,
            effects,
        }
    }

    async fn use_idea_for(
        &self,
        idea_id: &IdeaId,
        post_id: &PostId,
        now: DateTime<Utc>,
    ) -> Result<IdeaSync, LifecycleError> {
        let before = self.idea(idea_id).await?;
        if before.status == IdeaStatus::Used {
            return Ok(IdeaSync::AlreadyUsed(idea_id.clone()));
        }

        let mut idea = before.clone();
        idea.status = IdeaStatus::Used;
        idea.used_at = Some(now);
        idea.post_id = Some(post_id.clone());
        idea.updated_at = now;
        self.ideas.patch(&before, &idea).await?;
        Ok(IdeaSync::MarkedUsed(idea_id.clone()))
    }

    async fn flag_brief_created(
        &self,
        idea_id: &IdeaId,
        now: DateTime<Utc>,
    ) -> Result<IdeaSync, LifecycleError> {
        let before = self.idea(idea_id).await?;
        if !before.brief_created {
            let mut idea = before.clone();
            idea.brief_created = true;
            idea.updated_at = now;
            self.ideas.patch(&before, &idea).await?;
        }
        Ok(IdeaSync::BriefCreated(idea_id.clone()))
    }
}

/// Run an idea update whose failure must not fail the post operation.
async fn best_effort(
    idea_id: &IdeaId,
    update: impl Future<Output = Result<IdeaSync, LifecycleError>>,
) -> IdeaSync {
    match update.await {
        Ok(sync) => sync,
        Err(error) => {
            tracing::warn!(idea_id = %idea_id, %error, "Idea update skipped");
            IdeaSync::Failed {
                idea_id: idea_id.clone(),
                reason: error.to_string(),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use content_pipeline_core::Priority;
    use content_pipeline_core::store::Collection;
    use content_pipeline_testing::fixtures::{idea, post_for_idea, post_in};
    use content_pipeline_testing::{FailOn, InMemoryDocumentStore, ManualClock, test_epoch};
    use proptest::prelude::*;
    use serde_json::json;

    fn machine() -> (LifecycleStateMachine, InMemoryDocumentStore, ManualClock) {
        let store = InMemoryDocumentStore::new();
        let clock = ManualClock::new(test_epoch());
        let machine = LifecycleStateMachine::new(Arc::new(store.clone()), Arc::new(clock.clone()));
        (machine, store, clock)
    }

    fn status_strategy() -> impl Strategy<Value = PostStatus> {
        prop::sample::select(PostStatus::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn apply_transition_follows_the_table(from in status_strategy(), to in status_strategy()) {
            let mut post = post_in(from, test_epoch());
            let original = post.clone();
            let result = apply_transition(&mut post, to, test_epoch() + TimeDelta::hours(1));

            if from.allowed_transitions().contains(&to) {
                prop_assert!(result.is_ok());
                prop_assert_eq!(post.status, to);
            } else {
                prop_assert_eq!(result, Err(LifecycleError::InvalidTransition { from, to }));
                prop_assert_eq!(post, original);
            }
        }
    }

    #[test]
    fn first_publish_stamps_both_timestamps() {
        let mut post = post_in(PostStatus::Approved, test_epoch());
        post.scheduled_at = Some(test_epoch() + TimeDelta::days(3));
        let now = test_epoch() + TimeDelta::hours(2);

        let applied = apply_transition(&mut post, PostStatus::Published, now).unwrap();

        assert!(applied.first_publish);
        assert_eq!(post.published_at, Some(now));
        assert_eq!(post.scheduled_at, Some(now));
    }

    #[test]
    fn republish_after_regenerate_keeps_published_at() {
        let mut post = post_in(PostStatus::Published, test_epoch());
        let later = test_epoch() + TimeDelta::days(1);

        apply_transition(&mut post, PostStatus::Regenerate, later).unwrap();
        assert_eq!(post.published_at, Some(test_epoch()));

        for step in [PostStatus::NeedsReview, PostStatus::Approved] {
            apply_transition(&mut post, step, later).unwrap();
        }
        let applied = apply_transition(&mut post, PostStatus::Published, later).unwrap();

        assert!(!applied.first_publish);
        assert_eq!(post.published_at, Some(test_epoch()));
        assert_eq!(post.scheduled_at, Some(later));
    }

    #[test]
    fn derived_advance_only_from_brief_with_outline() {
        let with_outline = PostUpdate {
            outline: Some(json!({ "sections": [] })),
            ..PostUpdate::default()
        };
        assert_eq!(
            derived_advance(PostStatus::Brief, &with_outline),
            Some(PostStatus::Outline)
        );
        assert_eq!(derived_advance(PostStatus::Draft, &with_outline), None);
        assert_eq!(derived_advance(PostStatus::Brief, &PostUpdate::default()), None);

        let explicit = PostUpdate {
            status: Some(PostStatus::Draft),
            ..with_outline.clone()
        };
        assert_eq!(derived_advance(PostStatus::Brief, &explicit), None);

        let same_status = PostUpdate {
            status: Some(PostStatus::Brief),
            ..with_outline
        };
        assert_eq!(
            derived_advance(PostStatus::Brief, &same_status),
            Some(PostStatus::Outline)
        );
    }

    #[tokio::test]
    async fn invalid_transition_leaves_stored_post_unchanged() {
        let (machine, store, _) = machine();
        let post = post_in(PostStatus::Brief, test_epoch());
        store.insert_post(&post);

        let error = machine
            .transition(&post.id, PostStatus::Published)
            .await
            .unwrap_err();

        assert_eq!(
            error,
            LifecycleError::InvalidTransition {
                from: PostStatus::Brief,
                to: PostStatus::Published
            }
        );
        assert_eq!(store.write_count(), 0);
        assert_eq!(machine.post(&post.id).await.unwrap(), post);
    }

    #[tokio::test]
    async fn regenerate_requests_a_notification() {
        let (machine, store, _) = machine();
        let post = post_in(PostStatus::Draft, test_epoch());
        store.insert_post(&post);

        let outcome = machine
            .transition(&post.id, PostStatus::Regenerate)
            .await
            .unwrap();

        let [LifecycleEffect::NotifyRegenerate(notification)] = outcome.effects.as_slice() else {
            unreachable!("expected exactly one regenerate effect");
        };
        assert_eq!(notification.post_id, post.id);
        assert_eq!(notification.post.status, PostStatus::Regenerate);
    }

    #[tokio::test]
    async fn publish_marks_idea_used() {
        let (machine, store, _) = machine();
        let owner = idea("Ownership", Priority::High, test_epoch());
        let post = post_for_idea(&owner, PostStatus::Approved, test_epoch());
        store.insert_idea(&owner);
        store.insert_post(&post);

        let outcome = machine.publish_post(&post.id).await.unwrap();

        assert_eq!(outcome.idea_sync, Some(IdeaSync::MarkedUsed(owner.id.clone())));
        let stored = machine.idea(&owner.id).await.unwrap();
        assert_eq!(stored.status, IdeaStatus::Used);
        assert_eq!(stored.post_id, Some(post.id));
    }

    #[tokio::test]
    async fn idea_failure_does_not_fail_publish() {
        let (machine, store, _) = machine();
        let owner = idea("Ownership", Priority::High, test_epoch());
        let post = post_for_idea(&owner, PostStatus::Scheduled, test_epoch());
        store.insert_idea(&owner);
        store.insert_post(&post);
        store.fail_on(Collection::Ideas, FailOn::Update);

        let outcome = machine.publish_post(&post.id).await.unwrap();

        assert_eq!(outcome.post.status, PostStatus::Published);
        assert!(matches!(outcome.idea_sync, Some(IdeaSync::Failed { .. })));
    }

    #[tokio::test]
    async fn publish_requires_approval() {
        let (machine, store, _) = machine();
        let post = post_in(PostStatus::NeedsReview, test_epoch());
        store.insert_post(&post);

        let error = machine.publish_post(&post.id).await.unwrap_err();
        assert_eq!(error.code(), "INVALID_OPERATION");
    }

    #[tokio::test]
    async fn outline_on_brief_post_advances_and_flags_idea() {
        let (machine, store, _) = machine();
        let owner = idea("Traits", Priority::Medium, test_epoch());
        let post = post_for_idea(&owner, PostStatus::Brief, test_epoch());
        store.insert_idea(&owner);
        store.insert_post(&post);

        let update = PostUpdate {
            outline: Some(json!({ "sections": ["Intro", "Body"] })),
            ..PostUpdate::default()
        };
        let outcome = machine.update_post(&post.id, update).await.unwrap();

        assert!(outcome.derived);
        assert_eq!(outcome.post.status, PostStatus::Outline);
        assert_eq!(outcome.idea_sync, Some(IdeaSync::BriefCreated(owner.id.clone())));
        assert!(machine.idea(&owner.id).await.unwrap().brief_created);
    }

    #[tokio::test]
    async fn illegal_explicit_status_in_update_writes_nothing() {
        let (machine, store, _) = machine();
        let post = post_in(PostStatus::Draft, test_epoch());
        store.insert_post(&post);

        let update = PostUpdate {
            title: Some("New title".to_string()),
            status: Some(PostStatus::Published),
            ..PostUpdate::default()
        };
        let error = machine.update_post(&post.id, update).await.unwrap_err();

        assert!(matches!(error, LifecycleError::InvalidTransition { .. }));
        assert_eq!(machine.post(&post.id).await.unwrap().title, None);
    }

    #[tokio::test]
    async fn content_only_update_keeps_status() {
        let (machine, store, clock) = machine();
        let post = post_in(PostStatus::Draft, test_epoch());
        store.insert_post(&post);
        clock.advance(TimeDelta::minutes(5));

        let update = PostUpdate {
            draft: Some(json!({ "body": "text" })),
            status: Some(PostStatus::Draft),
            ..PostUpdate::default()
        };
        let outcome = machine.update_post(&post.id, update).await.unwrap();

        assert!(!outcome.status_changed());
        assert_eq!(outcome.post.updated_at, test_epoch() + TimeDelta::minutes(5));
        assert!(outcome.effects.is_empty());
    }

    #[tokio::test]
    async fn release_returns_processing_idea_to_pool() {
        let (machine, store, _) = machine();
        let mut held = idea("Async", Priority::Low, test_epoch());
        held.status = IdeaStatus::Processing;
        store.insert_idea(&held);

        let released = machine.release_idea(&held.id).await.unwrap();
        assert_eq!(released.status, IdeaStatus::Unused);

        let again = machine.release_idea(&held.id).await.unwrap();
        assert_eq!(again.status, IdeaStatus::Unused);
    }

    #[tokio::test]
    async fn used_ideas_are_protected() {
        let (machine, store, _) = machine();
        let mut used = idea("Done", Priority::High, test_epoch());
        used.status = IdeaStatus::Used;
        store.insert_idea(&used);

        for error in [
            machine.mark_idea_used(&used.id, None).await.unwrap_err(),
            machine.release_idea(&used.id).await.unwrap_err(),
            machine.delete_idea(&used.id).await.unwrap_err(),
            machine.create_post_from_idea(&used.id, None).await.unwrap_err(),
        ] {
            assert_eq!(error.code(), "CONFLICT");
        }
    }

    #[tokio::test]
    async fn post_from_idea_links_both_ways() {
        let (machine, store, _) = machine();
        let source = idea("Macros", Priority::High, test_epoch());
        store.insert_idea(&source);

        let post = machine.create_post_from_idea(&source.id, None).await.unwrap();

        assert_eq!(post.status, PostStatus::Brief);
        assert_eq!(post.idea_id, Some(source.id.clone()));
        assert_eq!(post.title.as_deref(), Some("Macros"));
        assert_eq!(machine.idea(&source.id).await.unwrap().post_id, Some(post.id));
    }
}
