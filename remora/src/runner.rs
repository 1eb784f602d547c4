use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{Result, RunnerError};
use crate::job::{JobId, JobSpec};
use crate::registry::JobRegistry;
use crate::state::JobStateStore;
use crate::store::DocumentStore;
use crate::telemetry;

/// Transient result of one job run.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub job_id: JobId,
    /// Correlation id distinguishing this run in the logs.
    pub run_id: Uuid,
    /// Wall-clock start of the run, as written to `last_run`.
    pub started_at: DateTime<Utc>,
    /// Elapsed wall-clock time of the job logic.
    pub elapsed: std::time::Duration,
    /// Whether the job returned a new config.
    pub config_updated: bool,
    /// Whether the record write succeeded. False only when the new config
    /// could not be encoded by the store; the computation still happened.
    pub persisted: bool,
}

/// Drives one job run to completion and owns the administrative
/// create/delete paths.
///
/// Execution is synchronous from the caller's point of view: one `run` call
/// processes one job before returning, and the only suspension points are
/// store I/O. The runner performs no locking; at most one concurrent run per
/// job id is the caller's responsibility.
pub struct JobRunner {
    registry: JobRegistry,
    states: JobStateStore,
    store: Arc<dyn DocumentStore>,
}

impl JobRunner {
    pub fn new(registry: JobRegistry, states: JobStateStore, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            registry,
            states,
            store,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn states(&self) -> &JobStateStore {
        &self.states
    }

    /// Run the job with the given id.
    ///
    /// Sequence: ensure the record schema, resolve the job, load its prior
    /// config, capture `last_run` (start time, so an interrupted run still
    /// leaves an "attempted at T" marker), invoke the job logic, persist.
    /// `config` is written only when the job returned one; a store-side
    /// encoding failure is logged and reported via
    /// [`RunReport::persisted`] instead of failing the run.
    pub async fn run(&self, id: &JobId) -> Result<RunReport> {
        let run_id = Uuid::now_v7();
        info!(job_id = %id, run_id = %run_id, "processing run request");

        self.states.ensure_schema().await?;

        let mut job = match self.registry.resolve(id) {
            Ok(job) => job,
            Err(err) => {
                // Reported, not fatal to the process: nothing is written for
                // this invocation.
                error!(job_id = %id, run_id = %run_id, "aborting run, job not resolvable");
                return Err(err);
            }
        };

        let prior = self.states.load(id).await?;

        // Start time, captured before invoking the job logic.
        let last_run = Utc::now();
        info!(job_id = %id, run_id = %run_id, "running job");

        let timing = telemetry::record_run_start(id.as_str());
        let outcome = job.run(self.store.as_ref(), prior).await;
        let elapsed = timing.elapsed();

        let new_config = match outcome {
            Ok(new_config) => new_config,
            Err(source) => {
                return Err(RunnerError::Job {
                    job: id.clone(),
                    source,
                });
            }
        };
        info!(
            job_id = %id,
            run_id = %run_id,
            elapsed_secs = elapsed.as_secs_f64(),
            "job finished"
        );

        let config_updated = new_config.is_some();
        let persisted = match self.states.save(id, last_run, new_config).await {
            Ok(()) => true,
            Err(RunnerError::Serialization { job, reason }) => {
                // The computation already happened; only persistence is lost.
                warn!(
                    job_id = %job,
                    run_id = %run_id,
                    reason = %reason,
                    "new config not in a storable format, couldn't be stored"
                );
                false
            }
            Err(err) => return Err(err),
        };

        Ok(RunReport {
            job_id: id.clone(),
            run_id,
            started_at: last_run,
            elapsed,
            config_updated,
            persisted,
        })
    }

    /// Create (or replace) the artifact for a job. Administrative path,
    /// independent of `run`.
    pub fn create_job(&self, id: &JobId, spec: &JobSpec) -> Result<()> {
        self.registry.create(id, spec)
    }

    /// Delete a job: its artifact, then its record.
    ///
    /// A missing artifact is an explicit [`RunnerError::NotFound`]. A
    /// missing record is tolerated; the artifact is the authority for
    /// whether the job exists.
    pub async fn delete_job(&self, id: &JobId) -> Result<()> {
        self.registry.remove(id)?;

        let removed = self.states.remove(id).await?;
        if !removed {
            info!(job_id = %id, "no stored record for deleted job");
        }
        Ok(())
    }
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("registry", &self.registry)
            .field("states", &self.states)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;

    use crate::job::{Job, JobFactory, JobSpec};
    use crate::store::{CollectionSchema, SearchPage, SearchQuery};

    /// Store that holds nothing and accepts every write.
    struct NullStore;

    #[async_trait]
    impl DocumentStore for NullStore {
        async fn collection_exists(&self, _collection: &str) -> anyhow::Result<bool> {
            Ok(false)
        }

        async fn create_collection(
            &self,
            _collection: &str,
            _schema: CollectionSchema,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        async fn get(&self, _collection: &str, _id: &str) -> anyhow::Result<Option<Value>> {
            Ok(None)
        }

        async fn put(&self, _collection: &str, _id: &str, _document: Value) -> anyhow::Result<()> {
            Ok(())
        }

        async fn delete(&self, _collection: &str, _id: &str) -> anyhow::Result<bool> {
            Ok(false)
        }

        async fn search(
            &self,
            _collection: &str,
            _query: SearchQuery,
        ) -> anyhow::Result<SearchPage> {
            Ok(SearchPage::default())
        }
    }

    struct FailingJob;

    #[async_trait]
    impl Job for FailingJob {
        async fn run(
            &mut self,
            _store: &dyn DocumentStore,
            _prior: Value,
        ) -> anyhow::Result<Option<Value>> {
            anyhow::bail!("store unreachable mid-scan")
        }
    }

    struct FailingFactory;

    impl JobFactory for FailingFactory {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn build(&self, _spec: &JobSpec) -> anyhow::Result<Box<dyn Job>> {
            Ok(Box::new(FailingJob))
        }
    }

    fn runner_with_factory(dir: &std::path::Path) -> JobRunner {
        let store: Arc<dyn DocumentStore> = Arc::new(NullStore);
        let mut registry = JobRegistry::new(dir);
        registry.register(Arc::new(FailingFactory));
        let states = JobStateStore::new(store.clone(), "jobs");
        JobRunner::new(registry, states, store)
    }

    #[tokio::test]
    async fn test_run_unresolvable_job_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_with_factory(dir.path());

        let err = runner.run(&JobId::from("ghost")).await.unwrap_err();
        assert!(matches!(err, RunnerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_failing_job_surfaces_as_job_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_with_factory(dir.path());
        let id = JobId::from("j1");

        runner
            .create_job(&id, &JobSpec::new("body").with_runner("failing"))
            .unwrap();

        let err = runner.run(&id).await.unwrap_err();
        assert!(matches!(err, RunnerError::Job { .. }));
    }
}
