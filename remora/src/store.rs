use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schema hints supplied when creating a collection.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Fields stored verbatim but excluded from indexing. They must never be
    /// used as search or filter fields, only as payload.
    pub opaque_fields: Vec<String>,
}

impl CollectionSchema {
    /// Mark a field as opaque payload.
    pub fn with_opaque_field(mut self, field: impl Into<String>) -> Self {
        self.opaque_fields.push(field.into());
        self
    }
}

/// A match-all query over one collection, with paging and field projection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Maximum number of hits per page.
    pub size: usize,
    /// Fields to project into each hit; empty means full documents.
    pub fields: Vec<String>,
    /// Continuation token returned by a previous page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    /// Keep-alive for the continuation cursor, in seconds. Backends whose
    /// cursors do not expire may ignore it.
    pub keep_alive_secs: u64,
}

impl SearchQuery {
    /// Create a match-all query with the given page size.
    pub fn match_all(size: usize) -> Self {
        Self {
            size,
            fields: Vec::new(),
            cursor: None,
            keep_alive_secs: 60,
        }
    }

    /// Project only the given field into each hit.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Continue from a cursor returned by a previous page.
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    /// Set the cursor keep-alive.
    pub fn with_keep_alive(mut self, secs: u64) -> Self {
        self.keep_alive_secs = secs;
        self
    }
}

/// One document returned by a search.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document id within the collection.
    pub id: String,
    /// The (possibly projected) document body.
    pub document: Value,
}

/// One page of search results.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchPage {
    pub hits: Vec<SearchHit>,
    /// Cursor for the next page; `None` when the result set is exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Marker error for a document the store cannot encode.
///
/// Store implementations wrap this into their `anyhow` errors so callers can
/// classify encoding failures apart from transport failures.
#[derive(Debug)]
pub struct EncodingError(pub String);

impl std::fmt::Display for EncodingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "document could not be encoded: {}", self.0)
    }
}

impl std::error::Error for EncodingError {}

/// Seam to the external document/search store.
///
/// Only the operations the runner consumes appear here; the network client
/// behind an implementation is its own concern. Implementations tolerate
/// missing collections on the read path: `get` returns `None` and `search`
/// returns an empty page rather than failing.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Check whether a collection exists.
    async fn collection_exists(&self, collection: &str) -> anyhow::Result<bool>;

    /// Create a collection if absent. Duplicate creation is a no-op, not an
    /// error, and is safe to call concurrently with itself.
    async fn create_collection(
        &self,
        collection: &str,
        schema: CollectionSchema,
    ) -> anyhow::Result<()>;

    /// Fetch a document by id. `None` when the document or the collection
    /// does not exist.
    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Value>>;

    /// Insert or replace a document by id.
    async fn put(&self, collection: &str, id: &str, document: Value) -> anyhow::Result<()>;

    /// Delete a document by id. Returns whether a document was present.
    async fn delete(&self, collection: &str, id: &str) -> anyhow::Result<bool>;

    /// Run one page of a scrolled search.
    async fn search(&self, collection: &str, query: SearchQuery) -> anyhow::Result<SearchPage>;
}
