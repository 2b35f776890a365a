//! In-memory document store for fast, deterministic tests.
//!
//! Every operation yields to the scheduler once before touching the data, the
//! way a networked store would suspend the caller. Concurrent lifecycle
//! operations therefore interleave at the same points they would in
//! production.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use content_pipeline_core::store::{
    Collection, Document, DocumentStore, Query, StoreError, StoreFuture, to_document,
};
use content_pipeline_core::types::{Idea, Post};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Store operation that can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailOn {
    /// `get`
    Get,
    /// `query`
    Query,
    /// `set`
    Set,
    /// `update`
    Update,
    /// `delete`
    Delete,
}

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<Collection, BTreeMap<String, Document>>,
    failures: HashSet<(Collection, FailOn)>,
    writes: usize,
}

/// In-memory [`DocumentStore`].
///
/// Clones share the same data, so a test can keep a handle for seeding and
/// inspection while the service under test owns another.
///
/// # Example
///
/// ```
/// use content_pipeline_testing::InMemoryDocumentStore;
/// use content_pipeline_core::store::{Collection, DocumentStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryDocumentStore::new();
/// store.set(Collection::Ideas, "i-1".to_string(), serde_json::Map::new()).await?;
/// assert!(store.contains(Collection::Ideas, "i-1"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryDocumentStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryDocumentStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `op` on `collection` fail with a backend error.
    pub fn fail_on(&self, collection: Collection, op: FailOn) {
        self.inner.write().unwrap().failures.insert((collection, op));
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.inner.write().unwrap().failures.clear();
    }

    /// Seed a post directly, bypassing the lifecycle engine.
    pub fn insert_post(&self, post: &Post) {
        let document = to_document(post).unwrap();
        self.insert_raw(Collection::Posts, post.id.as_str(), document);
    }

    /// Seed an idea directly, bypassing the lifecycle engine.
    pub fn insert_idea(&self, idea: &Idea) {
        let document = to_document(idea).unwrap();
        self.insert_raw(Collection::Ideas, idea.id.as_str(), document);
    }

    /// Seed a raw document.
    pub fn insert_raw(&self, collection: Collection, id: &str, document: Document) {
        self.inner
            .write()
            .unwrap()
            .collections
            .entry(collection)
            .or_default()
            .insert(id.to_string(), document);
    }

    /// Read a raw document without going through the async interface.
    #[must_use]
    pub fn document(&self, collection: Collection, id: &str) -> Option<Document> {
        self.inner
            .read()
            .unwrap()
            .collections
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    /// Check if a document exists
    #[must_use]
    pub fn contains(&self, collection: Collection, id: &str) -> bool {
        self.document(collection, id).is_some()
    }

    /// Number of documents in a collection
    #[must_use]
    pub fn len(&self, collection: Collection) -> usize {
        self.inner
            .read()
            .unwrap()
            .collections
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }

    /// Check if a collection is empty
    #[must_use]
    pub fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection) == 0
    }

    /// Number of successful writes (`set`, `update`, `delete`) so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.read().unwrap().writes
    }

    fn check(&self, collection: Collection, op: FailOn) -> Result<(), StoreError> {
        if self.inner.read().unwrap().failures.contains(&(collection, op)) {
            return Err(StoreError::Backend(format!(
                "injected {op:?} failure on {collection}"
            )));
        }
        Ok(())
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn get(&self, collection: Collection, id: String) -> StoreFuture<'_, Option<Document>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.check(collection, FailOn::Get)?;
            Ok(self.document(collection, &id))
        })
    }

    fn query(&self, collection: Collection, query: Query) -> StoreFuture<'_, Vec<Document>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.check(collection, FailOn::Query)?;

            let inner = self.inner.read().unwrap();
            let mut results: Vec<Document> = inner
                .collections
                .get(&collection)
                .map(|docs| docs.values().filter(|doc| query.matches(doc)).cloned().collect())
                .unwrap_or_default();
            drop(inner);

            results.sort_by(|a, b| query.compare(a, b));
            if let Some(limit) = query.limit {
                results.truncate(limit);
            }
            Ok(results)
        })
    }

    fn set(&self, collection: Collection, id: String, document: Document) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.check(collection, FailOn::Set)?;

            let mut inner = self.inner.write().unwrap();
            inner.collections.entry(collection).or_default().insert(id, document);
            inner.writes += 1;
            Ok(())
        })
    }

    fn update(&self, collection: Collection, id: String, patch: Document) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.check(collection, FailOn::Update)?;

            let mut inner = self.inner.write().unwrap();
            let Some(existing) = inner
                .collections
                .get_mut(&collection)
                .and_then(|docs| docs.get_mut(&id))
            else {
                return Err(StoreError::NotFound { collection, id });
            };
            existing.extend(patch);
            inner.writes += 1;
            Ok(())
        })
    }

    fn delete(&self, collection: Collection, id: String) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.check(collection, FailOn::Delete)?;

            let mut inner = self.inner.write().unwrap();
            if let Some(docs) = inner.collections.get_mut(&collection) {
                docs.remove(&id);
            }
            inner.writes += 1;
            Ok(())
        })
    }
}
