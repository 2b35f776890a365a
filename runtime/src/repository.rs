//! Typed access to the document store.
//!
//! A [`Repository`] maps one record type onto one collection. Writes of an
//! existing record go through [`Repository::patch`], which sends only the
//! top-level fields that changed, so concurrent writers touching different
//! fields do not clobber each other.

use content_pipeline_core::error::{EntityKind, LifecycleError};
use content_pipeline_core::store::{
    Collection, Document, DocumentStore, Query, from_document, to_document,
};
use content_pipeline_core::types::{Idea, Post};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A record persisted in its own collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Collection holding records of this type
    const COLLECTION: Collection;
    /// Entity kind reported in `NotFound` errors
    const KIND: EntityKind;

    /// Document id
    fn record_id(&self) -> &str;
}

impl Record for Post {
    const COLLECTION: Collection = Collection::Posts;
    const KIND: EntityKind = EntityKind::Post;

    fn record_id(&self) -> &str {
        self.id.as_str()
    }
}

impl Record for Idea {
    const COLLECTION: Collection = Collection::Ideas;
    const KIND: EntityKind = EntityKind::Idea;

    fn record_id(&self) -> &str {
        self.id.as_str()
    }
}

/// Store access for records of type `T`.
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _record: PhantomData,
        }
    }
}

impl<T: Record> fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("collection", &T::COLLECTION)
            .finish_non_exhaustive()
    }
}

impl<T: Record> Repository<T> {
    /// Create a repository over `store`
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    /// Load a record, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] if the store fails or the document
    /// does not decode.
    pub async fn get(&self, id: &str) -> Result<Option<T>, LifecycleError> {
        let document = self.store.get(T::COLLECTION, id.to_string()).await?;
        Ok(document.map(from_document).transpose()?)
    }

    /// Load a record that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotFound`] if it does not, or
    /// [`LifecycleError::Store`] on store failure.
    pub async fn require(&self, id: &str) -> Result<T, LifecycleError> {
        self.get(id).await?.ok_or_else(|| LifecycleError::NotFound {
            kind: T::KIND,
            id: id.to_string(),
        })
    }

    /// Write the whole record.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] on store failure.
    pub async fn save(&self, record: &T) -> Result<(), LifecycleError> {
        let document = to_document(record)?;
        self.store
            .set(T::COLLECTION, record.record_id().to_string(), document)
            .await?;
        Ok(())
    }

    /// Write the fields that differ between `before` and `after`. Nothing is
    /// written when they are equal.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] on store failure, including a
    /// document deleted since it was read.
    pub async fn patch(&self, before: &T, after: &T) -> Result<(), LifecycleError> {
        let patch = diff(&to_document(before)?, to_document(after)?);
        if patch.is_empty() {
            return Ok(());
        }
        self.store
            .update(T::COLLECTION, after.record_id().to_string(), patch)
            .await?;
        Ok(())
    }

    /// Run a query and decode the results.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] on store failure.
    pub async fn query(&self, query: Query) -> Result<Vec<T>, LifecycleError> {
        let documents = self.store.query(T::COLLECTION, query).await?;
        Ok(documents
            .into_iter()
            .map(from_document)
            .collect::<Result<Vec<T>, _>>()?)
    }

    /// Remove a record.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] on store failure.
    pub async fn delete(&self, id: &str) -> Result<(), LifecycleError> {
        self.store.delete(T::COLLECTION, id.to_string()).await?;
        Ok(())
    }
}

fn diff(before: &Document, after: Document) -> Document {
    after
        .into_iter()
        .filter(|(field, value)| before.get(field) != Some(value))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use content_pipeline_core::PostStatus;
    use content_pipeline_testing::fixtures::post_in;
    use content_pipeline_testing::{InMemoryDocumentStore, test_epoch};
    use serde_json::json;

    fn posts(store: &InMemoryDocumentStore) -> Repository<Post> {
        Repository::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn require_reports_missing_records() {
        let store = InMemoryDocumentStore::new();
        let error = posts(&store).require("nope").await.unwrap_err();
        assert_eq!(error, LifecycleError::post_not_found("nope"));
    }

    #[tokio::test]
    async fn save_then_get_returns_the_record() {
        let store = InMemoryDocumentStore::new();
        let repo = posts(&store);
        let post = post_in(PostStatus::Draft, test_epoch());

        repo.save(&post).await.unwrap();
        assert_eq!(repo.get(post.id.as_str()).await.unwrap(), Some(post));
    }

    #[tokio::test]
    async fn patch_sends_only_changed_fields() {
        let store = InMemoryDocumentStore::new();
        let repo = posts(&store);
        let before = post_in(PostStatus::Draft, test_epoch());
        store.insert_post(&before);

        // A concurrent writer changes the title behind our back.
        let mut raw = store.document(Collection::Posts, before.id.as_str()).unwrap();
        raw.insert("title".to_string(), json!("Concurrent title"));
        store.insert_raw(Collection::Posts, before.id.as_str(), raw);

        let mut after = before.clone();
        after.status = PostStatus::NeedsReview;
        repo.patch(&before, &after).await.unwrap();

        let stored = repo.require(before.id.as_str()).await.unwrap();
        assert_eq!(stored.status, PostStatus::NeedsReview);
        assert_eq!(stored.title.as_deref(), Some("Concurrent title"));
    }

    #[tokio::test]
    async fn identical_patch_writes_nothing() {
        let store = InMemoryDocumentStore::new();
        let post = post_in(PostStatus::Brief, test_epoch());
        store.insert_post(&post);

        posts(&store).patch(&post, &post).await.unwrap();
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn diff_includes_fields_cleared_to_null() {
        let before = json!({ "a": 1, "b": "x" }).as_object().cloned().unwrap();
        let after = json!({ "a": 1, "b": null }).as_object().cloned().unwrap();
        let patch = diff(&before, after);
        assert_eq!(patch.len(), 1);
        assert_eq!(patch["b"], serde_json::Value::Null);
    }
}
