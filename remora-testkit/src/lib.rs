//! Test doubles for the remora job runner.
//!
//! Provides an in-memory [`MemoryStore`] implementing the `DocumentStore`
//! seam (with fault injection for the encoding-failure path), scripted job
//! types, and seed helpers shared by integration tests, benches, and
//! examples.

pub mod job;
pub mod store;

pub use job::{ScriptedFactory, ScriptedJob};
pub use store::{seed_field_docs, MemoryStore};
