//! Integration tests for the PostgreSQL document store backend.
//!
//! Requires a running Postgres instance.
//! Run with: `cargo test --test postgres_store --features postgres -- --ignored`

#![cfg(feature = "postgres")]

use std::sync::Arc;

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use remora::persistence::PostgresDocumentStore;
use remora::store::{CollectionSchema, DocumentStore, SearchQuery};
use remora::{JobId, JobStateStore};

async fn connect() -> PostgresDocumentStore {
    let pool = PgPool::connect(
        &std::env::var("DATABASE_URL").expect("DATABASE_URL required"),
    )
    .await
    .expect("connect");
    let store = PostgresDocumentStore::new(pool);
    store.ensure_tables().await.expect("ensure_tables");
    store
}

async fn cleanup(pool: &PgPool, collection: &str) {
    sqlx::query("DELETE FROM remora_documents WHERE collection = $1")
        .bind(collection)
        .execute(pool)
        .await
        .ok();
    sqlx::query("DELETE FROM remora_collections WHERE name = $1")
        .bind(collection)
        .execute(pool)
        .await
        .ok();
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn document_roundtrip_and_delete() {
    let store = connect().await;
    let collection = format!("test-docs-{}", Uuid::new_v4());

    assert!(store.get(&collection, "d1").await.unwrap().is_none());

    store
        .put(&collection, "d1", json!({"v": 1}))
        .await
        .unwrap();
    store
        .put(&collection, "d1", json!({"v": 2}))
        .await
        .unwrap();
    assert_eq!(
        store.get(&collection, "d1").await.unwrap(),
        Some(json!({"v": 2}))
    );

    assert!(store.delete(&collection, "d1").await.unwrap());
    assert!(!store.delete(&collection, "d1").await.unwrap());

    cleanup(store.pool(), &collection).await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn create_collection_twice_is_a_no_op() {
    let store = connect().await;
    let collection = format!("test-coll-{}", Uuid::new_v4());

    assert!(!store.collection_exists(&collection).await.unwrap());
    store
        .create_collection(
            &collection,
            CollectionSchema::default().with_opaque_field("config"),
        )
        .await
        .unwrap();
    store
        .create_collection(&collection, CollectionSchema::default())
        .await
        .unwrap();
    assert!(store.collection_exists(&collection).await.unwrap());

    cleanup(store.pool(), &collection).await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn search_pages_with_cursor_and_projection() {
    let store = connect().await;
    let collection = format!("test-search-{}", Uuid::new_v4());

    for i in 0..5 {
        store
            .put(
                &collection,
                &format!("doc-{i:05}"),
                json!({"value": i, "noise": "x"}),
            )
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    let mut query = SearchQuery::match_all(2).with_field("value");
    loop {
        let page = store.search(&collection, query.clone()).await.unwrap();
        for hit in &page.hits {
            assert!(hit.document.get("noise").is_none(), "projection applied");
            seen.push(hit.document["value"].as_i64().unwrap());
        }
        match page.cursor {
            Some(cursor) if !page.hits.is_empty() => query.cursor = Some(cursor),
            _ => break,
        }
    }
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);

    cleanup(store.pool(), &collection).await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn state_store_partial_update_semantics() {
    let store = Arc::new(connect().await);
    let collection = format!("test-jobs-{}", Uuid::new_v4());
    let states = JobStateStore::new(store.clone(), &collection);
    let id = JobId::from("pg-job");

    states.ensure_schema().await.unwrap();
    assert!(states.load(&id).await.unwrap().is_null());

    let t1 = chrono::Utc::now();
    states
        .save(&id, t1, Some(json!({"slots": [1.0]})))
        .await
        .unwrap();
    assert_eq!(states.load(&id).await.unwrap(), json!({"slots": [1.0]}));

    // last_run-only update keeps the stored config.
    states.save(&id, chrono::Utc::now(), None).await.unwrap();
    assert_eq!(states.load(&id).await.unwrap(), json!({"slots": [1.0]}));

    assert!(states.remove(&id).await.unwrap());
    assert!(!states.remove(&id).await.unwrap());

    cleanup(store.pool(), &collection).await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn nul_byte_config_is_a_serialization_error() {
    let store = Arc::new(connect().await);
    let collection = format!("test-enc-{}", Uuid::new_v4());
    let states = JobStateStore::new(store.clone(), &collection);
    let id = JobId::from("pg-job");

    let err = states
        .save(
            &id,
            chrono::Utc::now(),
            Some(json!({"bad": "nul\u{0}byte"})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, remora::RunnerError::Serialization { .. }));

    cleanup(store.pool(), &collection).await;
}
