use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::store::{CollectionSchema, DocumentStore, EncodingError, SearchHit, SearchPage, SearchQuery};

/// PostgreSQL-backed implementation of the document store.
///
/// Documents live in a single JSONB table keyed by `(collection, id)`; a
/// companion table records which collections exist and which of their
/// fields are opaque payload. Scrolled search uses keyset pagination over
/// the document id, so continuation cursors never expire and the
/// keep-alive hint is ignored.
#[derive(Debug)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Create a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the backing tables if they do not exist yet.
    pub async fn ensure_tables(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS remora_collections (
                name          TEXT PRIMARY KEY,
                opaque_fields JSONB NOT NULL DEFAULT '[]'::jsonb,
                created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS remora_documents (
                collection TEXT NOT NULL,
                id         TEXT NOT NULL,
                body       JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn collection_exists(&self, collection: &str) -> anyhow::Result<bool> {
        let row = sqlx::query("SELECT 1 FROM remora_collections WHERE name = $1")
            .bind(collection)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn create_collection(
        &self,
        collection: &str,
        schema: CollectionSchema,
    ) -> anyhow::Result<()> {
        let opaque = serde_json::to_value(&schema.opaque_fields)?;
        // ON CONFLICT keeps duplicate creation a no-op, including when two
        // processes race on the same collection.
        sqlx::query(
            r#"
            INSERT INTO remora_collections (name, opaque_fields)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(collection)
        .bind(&opaque)
        .execute(&self.pool)
        .await?;

        debug!(collection, "collection ensured");
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Value>> {
        let row = sqlx::query(
            "SELECT body FROM remora_documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.try_get::<Value, _>("body")?)),
            None => Ok(None),
        }
    }

    async fn put(&self, collection: &str, id: &str, document: Value) -> anyhow::Result<()> {
        // JSONB rejects NUL bytes in strings; surface that as the encoding
        // marker rather than letting the driver fail opaquely.
        if let Err(reason) = check_encodable(&document) {
            return Err(anyhow::Error::new(EncodingError(reason)));
        }

        sqlx::query(
            r#"
            INSERT INTO remora_documents (collection, id, body, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (collection, id)
            DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(&document)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "DELETE FROM remora_documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn search(&self, collection: &str, query: SearchQuery) -> anyhow::Result<SearchPage> {
        let rows = sqlx::query(
            r#"
            SELECT id, body
            FROM remora_documents
            WHERE collection = $1
              AND ($2::text IS NULL OR id > $2)
            ORDER BY id ASC
            LIMIT $3
            "#,
        )
        .bind(collection)
        .bind(query.cursor.as_deref())
        .bind(query.size as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let body: Value = row.try_get("body")?;
            hits.push(SearchHit {
                id,
                document: project(body, &query.fields),
            });
        }

        let cursor = if hits.len() == query.size {
            hits.last().map(|hit| hit.id.clone())
        } else {
            None
        };

        Ok(SearchPage { hits, cursor })
    }
}

/// Walk a document for values JSONB cannot represent.
fn check_encodable(value: &Value) -> Result<(), String> {
    match value {
        Value::String(s) => {
            if s.contains('\u{0}') {
                Err("string contains a NUL byte".to_string())
            } else {
                Ok(())
            }
        }
        Value::Array(items) => items.iter().try_for_each(check_encodable),
        Value::Object(map) => map
            .iter()
            .try_for_each(|(key, value)| {
                if key.contains('\u{0}') {
                    Err("object key contains a NUL byte".to_string())
                } else {
                    check_encodable(value)
                }
            }),
        _ => Ok(()),
    }
}

/// Apply a field projection to a document body. An empty projection keeps
/// the full document.
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
