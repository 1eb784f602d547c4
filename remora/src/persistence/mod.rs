/// PostgreSQL persistence implementation for the document store.
///
/// This module provides `PostgresDocumentStore`, a PostgreSQL-backed
/// implementation of the [`DocumentStore`](crate::store::DocumentStore)
/// trait using JSONB documents.
pub mod postgres;

pub use postgres::PostgresDocumentStore;
