use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use remora::store::{
    CollectionSchema, DocumentStore, EncodingError, SearchHit, SearchPage, SearchQuery,
};

/// In-memory document store for tests.
///
/// Documents are kept per collection in id order, so scrolled search pages
/// deterministically with the id as the continuation cursor. Like the real
/// backends, reads tolerate missing collections and puts auto-create the
/// document space.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, CollectionSchema>,
    documents: HashMap<String, BTreeMap<String, Value>>,
    put_failures: VecDeque<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an encoding failure: the next `put` fails with an
    /// [`EncodingError`] carrying the given reason.
    pub fn fail_next_put(&self, reason: impl Into<String>) {
        self.inner.lock().put_failures.push_back(reason.into());
    }

    /// Number of documents currently held in a collection.
    pub fn document_count(&self, collection: &str) -> usize {
        self.inner
            .lock()
            .documents
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Schema the collection was created with, if it was created.
    pub fn collection_schema(&self, collection: &str) -> Option<CollectionSchema> {
        self.inner.lock().collections.get(collection).cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn collection_exists(&self, collection: &str) -> anyhow::Result<bool> {
        Ok(self.inner.lock().collections.contains_key(collection))
    }

    async fn create_collection(
        &self,
        collection: &str,
        schema: CollectionSchema,
    ) -> anyhow::Result<()> {
        // Duplicate creation keeps the first schema, mirroring the no-op
        // contract of the real backends.
        self.inner
            .lock()
            .collections
            .entry(collection.to_string())
            .or_insert(schema);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Value>> {
        Ok(self
            .inner
            .lock()
            .documents
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn put(&self, collection: &str, id: &str, document: Value) -> anyhow::Result<()> {
        let mut inner = self.inner.lock();
        if let Some(reason) = inner.put_failures.pop_front() {
            return Err(anyhow::Error::new(EncodingError(reason)));
        }
        inner
            .documents
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> anyhow::Result<bool> {
        Ok(self
            .inner
            .lock()
            .documents
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some())
    }

    async fn search(&self, collection: &str, query: SearchQuery) -> anyhow::Result<SearchPage> {
        let inner = self.inner.lock();
        let Some(docs) = inner.documents.get(collection) else {
            return Ok(SearchPage::default());
        };

        let hits: Vec<SearchHit> = docs
            .iter()
            .filter(|(id, _)| match &query.cursor {
                Some(cursor) => id.as_str() > cursor.as_str(),
                None => true,
            })
            .take(query.size)
            .map(|(id, body)| SearchHit {
                id: id.clone(),
                document: project(body.clone(), &query.fields),
            })
            .collect();

        let cursor = if hits.len() == query.size {
            hits.last().map(|hit| hit.id.clone())
        } else {
            None
        };

        Ok(SearchPage { hits, cursor })
    }
}

fn project(body: Value, fields: &[String]) -> Value {
    if fields.is_empty() {
        return body;
    }
    match body {
        Value::Object(mut map) => {
            let mut projected = serde_json::Map::with_capacity(fields.len());
            for field in fields {
                if let Some(value) = map.remove(field) {
                    projected.insert(field.clone(), value);
                }
            }
            Value::Object(projected)
        }
        other => other,
    }
}

/// Seed a collection with one single-field document per value, with ids
/// that page in seeding order.
pub async fn seed_field_docs(
    store: &MemoryStore,
    collection: &str,
    field: &str,
    values: &[Value],
) -> anyhow::Result<()> {
    for (i, value) in values.iter().enumerate() {
        store
            .put(collection, &format!("doc-{i:05}"), json!({ field: value }))
            .await?;
    }
    Ok(())
}
