//! Document store abstraction consumed by the lifecycle engine.
//!
//! The engine persists ideas and posts as JSON documents keyed by id. The store
//! only has to support what a hosted document database offers: point reads,
//! whole-document writes, shallow merges, deletes, and simple queries made of
//! equality/range predicates with one ordering field. Anything richer (status
//! sets, tag intersection, free-text search) is filtered in memory by the
//! caller.
//!
//! # Dyn Compatibility
//!
//! This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` so it can be shared as `Arc<dyn DocumentStore>`.

use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// A stored record: a JSON object.
pub type Document = serde_json::Map<String, Value>;

/// Boxed future returned by every [`DocumentStore`] operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Named collection of documents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Content ideas
    Ideas,
    /// Posts
    Posts,
}

impl Collection {
    /// Collection name as used by the backing store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ideas => "ideas",
            Self::Posts => "posts",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by a [`DocumentStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Partial update targeted a document that does not exist.
    #[error("Document not found: {collection}/{id}")]
    NotFound {
        /// Collection that was addressed
        collection: Collection,
        /// Missing document id
        id: String,
    },

    /// Backend failure (connection, permission, quota, ...).
    #[error("Store backend error: {0}")]
    Backend(String),

    /// A document could not be converted to or from its typed form.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Comparison operator of a [`FieldFilter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    /// `field == value`
    Eq,
    /// `field < value`
    Lt,
    /// `field <= value`
    Lte,
    /// `field > value`
    Gt,
    /// `field >= value`
    Gte,
}

/// A single predicate on a top-level document field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldFilter {
    /// Top-level field name
    pub field: String,
    /// Operator
    pub op: FilterOp,
    /// Right-hand operand
    pub value: Value,
}

impl FieldFilter {
    /// Evaluate the predicate against a document.
    ///
    /// A missing field never matches. Range operators only match values of the
    /// same JSON kind (numbers with numbers, strings with strings).
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        let Some(actual) = document.get(&self.field) else {
            return false;
        };

        match self.op {
            FilterOp::Eq => actual == &self.value,
            op => match compare_values(actual, &self.value) {
                Some(ordering) => match op {
                    FilterOp::Lt => ordering == Ordering::Less,
                    FilterOp::Lte => ordering != Ordering::Greater,
                    FilterOp::Gt => ordering == Ordering::Greater,
                    FilterOp::Gte => ordering != Ordering::Less,
                    FilterOp::Eq => ordering == Ordering::Equal,
                },
                None => false,
            },
        }
    }
}

/// Sort direction of a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

/// Ordering clause of a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    /// Field to sort on
    pub field: String,
    /// Direction
    pub direction: Direction,
}

/// Query against one collection: predicates are AND-ed together.
///
/// # Example
///
/// ```
/// use content_pipeline_core::store::{Direction, Query};
/// use serde_json::json;
///
/// let query = Query::new()
///     .where_eq("status", json!("UNUSED"))
///     .order_by("createdAt", Direction::Ascending)
///     .limit(10);
/// assert_eq!(query.filters.len(), 1);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    /// Predicates, all of which must match
    pub filters: Vec<FieldFilter>,
    /// Optional ordering
    pub order_by: Option<OrderBy>,
    /// Optional maximum number of results
    pub limit: Option<usize>,
}

impl Query {
    /// Empty query: every document, store order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality predicate.
    #[must_use]
    pub fn where_eq(self, field: impl Into<String>, value: Value) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    /// Add an arbitrary predicate.
    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        self.filters.push(FieldFilter {
            field: field.into(),
            op,
            value,
        });
        self
    }

    /// Set the ordering clause.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Cap the number of results.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` if every predicate matches `document`.
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        self.filters.iter().all(|filter| filter.matches(document))
    }

    /// Order two documents according to the ordering clause.
    ///
    /// Documents missing the field sort last regardless of direction.
    #[must_use]
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let Some(order) = &self.order_by else {
            return Ordering::Equal;
        };

        match (a.get(&order.field), b.get(&order.field)) {
            (Some(left), Some(right)) => match compare_values(left, right) {
                Some(ordering) => match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                },
                None => Ordering::Equal,
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Compare two JSON scalars of the same kind.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Serialize a typed record into a [`Document`].
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] if the value does not serialize to a
/// JSON object.
pub fn to_document<T: serde::Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Serialization(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(StoreError::Serialization(e.to_string())),
    }
}

/// Deserialize a [`Document`] into a typed record.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] if the document does not match the
/// record's shape.
pub fn from_document<T: serde::de::DeserializeOwned>(document: Document) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(document))
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Document store collaborator.
///
/// Implementations must be `Send + Sync`; the engine shares one instance
/// across all concurrent operations.
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by id. `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    fn get(&self, collection: Collection, id: String) -> StoreFuture<'_, Option<Document>>;

    /// Run a query, returning matching documents in the requested order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    fn query(&self, collection: Collection, query: Query) -> StoreFuture<'_, Vec<Document>>;

    /// Create or replace a document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    fn set(&self, collection: Collection, id: String, document: Document) -> StoreFuture<'_, ()>;

    /// Shallow-merge `patch` into an existing document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the document does not exist, or
    /// [`StoreError::Backend`] if the backend fails.
    fn update(&self, collection: Collection, id: String, patch: Document) -> StoreFuture<'_, ()>;

    /// Delete a document. Deleting a missing document is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    fn delete(&self, collection: Collection, id: String) -> StoreFuture<'_, ()>;
}
