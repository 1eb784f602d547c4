//! Remora - Pluggable analytic job runner over a document store.
//!
//! A small core for loading named units of analytic logic, executing them
//! against an external document/search store, and carrying whatever state a
//! job wants into its next invocation.
//!
//! # Core Concepts
//!
//! - **Job**: A named unit of analytic logic implementing the [`Job`] trait:
//!   one async method taking a store handle and the job's prior config, and
//!   returning an optional new config to persist.
//!
//! - **Registry**: The [`JobRegistry`] owns job artifacts on disk and maps a
//!   job id to loadable logic through registered [`JobFactory`]
//!   implementations, a statically-typed plugin boundary keyed by runner
//!   name.
//!
//! - **Job records**: The [`JobStateStore`] round-trips each job's record
//!   (last run time plus an opaque config blob) through the document store,
//!   keyed by the job id. The config is pure pass-through payload; only the
//!   job that wrote it interprets it.
//!
//! - **Runner**: The [`JobRunner`] drives one run to completion: resolve,
//!   load prior config, execute with timing, persist. Create and delete are
//!   independent administrative paths.
//!
//! - **Store seam**: The [`DocumentStore`] trait abstracts the external
//!   store to the handful of operations this core consumes: collection
//!   existence/create, get/put/delete by id, and scrolled search.
//!
//! # Feature Flags
//!
//! - `postgres` - JSONB-backed `DocumentStore` implementation via sqlx
//! - `cli` - the `remora-jobs` administrative binary
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use remora::*;
//!
//! let config = RunnerConfig::new("jobs");
//! let mut registry = JobRegistry::new(&config.jobs_dir);
//! registry.register(Arc::new(MovingMeanFactory::new(config.paging)));
//!
//! let states = JobStateStore::new(store.clone(), &config.records_collection);
//! let runner = JobRunner::new(registry, states, store);
//! let report = runner.run(&JobId::from("temperature-trend")).await?;
//! ```

/// Reference job implementations: the streaming moving mean and the
/// whole-set mean.
pub mod analytics;

/// Configuration structures for the runner and store connections.
pub mod config;

/// Error classes and the crate-wide `Result` alias.
pub mod error;

/// Job identity, the job contract, and the factory plugin boundary.
pub mod job;

/// Artifact ownership and job resolution.
pub mod registry;

/// The execution orchestrator.
pub mod runner;

/// Job record persistence: the config store adapter.
pub mod state;

/// The document store seam and its query/result types.
pub mod store;

/// Tracing spans and run timing helpers.
pub mod telemetry;

#[cfg(feature = "postgres")]
/// PostgreSQL document store implementation.
///
/// Available when the `postgres` feature is enabled.
pub mod persistence;

pub use analytics::{
    MeanFactory, MeanJob, MeanParams, MovingMean, MovingMeanFactory, MovingMeanJob,
    MovingMeanParams, MovingMeanState,
};
pub use config::{RunnerConfig, SearchPaging, StoreConfig};
pub use error::{Result, RunnerError};
pub use job::{Job, JobFactory, JobId, JobSpec};
pub use registry::JobRegistry;
pub use runner::{JobRunner, RunReport};
pub use state::{JobRecord, JobStateStore};
pub use store::{
    CollectionSchema, DocumentStore, EncodingError, SearchHit, SearchPage, SearchQuery,
};
