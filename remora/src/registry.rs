use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use crate::error::{Result, RunnerError};
use crate::job::{Job, JobFactory, JobId, JobSpec};

/// Manifest file inside an artifact container.
const MANIFEST_FILE: &str = "job.json";
/// Verbatim code payload inside an artifact container.
const CODE_FILE: &str = "job.src";

/// Owns job artifacts and resolves job ids to loadable logic.
///
/// An artifact is a directory `jobs_dir/<id>/` holding the job's manifest
/// (its [`JobSpec`]) and its code payload. Resolution maps the manifest's
/// runner name to a registered [`JobFactory`]; the factory, not the
/// registry, decides what, if anything, the code payload means.
pub struct JobRegistry {
    jobs_dir: PathBuf,
    runners: HashMap<&'static str, Arc<dyn JobFactory>>,
    default_runner: Option<&'static str>,
}

impl JobRegistry {
    /// Create a registry rooted at the given artifacts directory.
    pub fn new(jobs_dir: impl Into<PathBuf>) -> Self {
        Self {
            jobs_dir: jobs_dir.into(),
            runners: HashMap::new(),
            default_runner: None,
        }
    }

    /// Directory the artifacts live in.
    pub fn jobs_dir(&self) -> &Path {
        &self.jobs_dir
    }

    /// Install a factory under its runner name, replacing any previous
    /// registration for that name.
    pub fn register(&mut self, factory: Arc<dyn JobFactory>) -> &mut Self {
        self.runners.insert(factory.name(), factory);
        self
    }

    /// Install a factory and make it the default for artifacts whose
    /// manifest names no runner.
    pub fn register_default(&mut self, factory: Arc<dyn JobFactory>) -> &mut Self {
        self.default_runner = Some(factory.name());
        self.register(factory)
    }

    /// Whether an artifact container exists for the given id.
    pub fn contains(&self, id: &JobId) -> bool {
        self.container(id).join(MANIFEST_FILE).is_file()
    }

    /// Resolve a job id to loadable logic.
    ///
    /// Fails with [`RunnerError::NotFound`] when the artifact is absent, the
    /// manifest cannot be parsed, the runner name is not registered, or the
    /// factory rejects the spec. All four are reported conditions, not
    /// faults: the caller aborts this run and the process may continue.
    pub fn resolve(&self, id: &JobId) -> Result<Box<dyn Job>> {
        let manifest = self.container(id).join(MANIFEST_FILE);
        let raw = match fs::read_to_string(&manifest) {
            Ok(raw) => raw,
            Err(err) => {
                error!(job_id = %id, error = %err, "code for job not found");
                return Err(RunnerError::NotFound(id.clone()));
            }
        };

        let spec: JobSpec = match serde_json::from_str(&raw) {
            Ok(spec) => spec,
            Err(err) => {
                error!(job_id = %id, error = %err, "job manifest couldn't be parsed");
                return Err(RunnerError::NotFound(id.clone()));
            }
        };

        let runner = spec.runner.as_deref().or(self.default_runner);
        let factory = match runner.and_then(|name| self.runners.get(name)) {
            Some(factory) => factory,
            None => {
                error!(
                    job_id = %id,
                    runner = runner.unwrap_or("<none>"),
                    "no registered runner for job"
                );
                return Err(RunnerError::NotFound(id.clone()));
            }
        };

        factory.build(&spec).map_err(|err| {
            error!(job_id = %id, error = %err, "job spec rejected by runner");
            RunnerError::NotFound(id.clone())
        })
    }

    /// Create (or replace) the artifact for a job id.
    ///
    /// Ensures the container directory exists, clears any pre-existing
    /// content, then writes the code payload and the manifest. Repeating a
    /// create with the same spec yields the same artifact.
    pub fn create(&self, id: &JobId, spec: &JobSpec) -> Result<()> {
        let dir = self.container(id);
        fs::create_dir_all(&dir)?;
        clear_dir(&dir)?;

        fs::write(dir.join(CODE_FILE), &spec.code)?;
        let manifest = serde_json::to_string_pretty(spec).map_err(|err| {
            RunnerError::Serialization {
                job: id.clone(),
                reason: err.to_string(),
            }
        })?;
        fs::write(dir.join(MANIFEST_FILE), manifest)?;

        info!(job_id = %id, dir = %dir.display(), "created artifact for job");
        Ok(())
    }

    /// Remove the artifact container for a job id.
    ///
    /// Fails with [`RunnerError::NotFound`] when no container exists: an
    /// explicit, reported condition rather than an unguarded fault.
    pub fn remove(&self, id: &JobId) -> Result<()> {
        let dir = self.container(id);
        if !dir.is_dir() {
            return Err(RunnerError::NotFound(id.clone()));
        }
        fs::remove_dir_all(&dir)?;
        info!(job_id = %id, "removed artifact for job");
        Ok(())
    }

    fn container(&self, id: &JobId) -> PathBuf {
        self.jobs_dir.join(id.as_str())
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut runners: Vec<_> = self.runners.keys().collect();
        runners.sort();
        f.debug_struct("JobRegistry")
            .field("jobs_dir", &self.jobs_dir)
            .field("runners", &runners)
            .field("default_runner", &self.default_runner)
            .finish()
    }
}

/// Remove every entry inside `dir`, leaving the directory itself in place.
fn clear_dir(dir: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::store::DocumentStore;

    struct StaticJob(&'static str);

    #[async_trait]
    impl Job for StaticJob {
        async fn run(
            &mut self,
            _store: &dyn DocumentStore,
            _prior: Value,
        ) -> anyhow::Result<Option<Value>> {
            Ok(Some(json!({ "ran": self.0 })))
        }
    }

    struct StaticFactory {
        name: &'static str,
    }

    impl JobFactory for StaticFactory {
        fn name(&self) -> &'static str {
            self.name
        }

        fn build(&self, _spec: &JobSpec) -> anyhow::Result<Box<dyn Job>> {
            Ok(Box::new(StaticJob(self.name)))
        }
    }

    fn registry_with(dir: &Path, names: &[&'static str]) -> JobRegistry {
        let mut registry = JobRegistry::new(dir);
        for &name in names {
            registry.register(Arc::new(StaticFactory { name }));
        }
        registry
    }

    #[test]
    fn test_resolve_missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(dir.path(), &["noop"]);
        let Err(err) = registry.resolve(&JobId::from("ghost")) else {
            panic!("expected resolve to fail");
        };
        assert!(matches!(err, RunnerError::NotFound(_)));
    }

    #[test]
    fn test_create_then_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(dir.path(), &["noop"]);
        let id = JobId::from("j1");

        let spec = JobSpec::new("body").with_runner("noop");
        registry.create(&id, &spec).unwrap();
        assert!(registry.contains(&id));
        assert!(registry.resolve(&id).is_ok());

        let code = fs::read_to_string(dir.path().join("j1").join(CODE_FILE)).unwrap();
        assert_eq!(code, "body");
    }

    #[test]
    fn test_create_replaces_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(dir.path(), &["a", "b"]);
        let id = JobId::from("j1");

        registry
            .create(&id, &JobSpec::new("first").with_runner("a"))
            .unwrap();
        // Leave residue that a replacement must clear.
        fs::write(dir.path().join("j1").join("stale.dat"), b"x").unwrap();

        registry
            .create(&id, &JobSpec::new("second").with_runner("b"))
            .unwrap();

        let code = fs::read_to_string(dir.path().join("j1").join(CODE_FILE)).unwrap();
        assert_eq!(code, "second");
        assert!(!dir.path().join("j1").join("stale.dat").exists());

        let manifest: JobSpec = serde_json::from_str(
            &fs::read_to_string(dir.path().join("j1").join(MANIFEST_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest.runner.as_deref(), Some("b"));
    }

    #[test]
    fn test_unknown_runner_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(dir.path(), &["noop"]);
        let id = JobId::from("j1");

        registry
            .create(&id, &JobSpec::new("body").with_runner("nonexistent"))
            .unwrap();
        let Err(err) = registry.resolve(&id) else {
            panic!("expected resolve to fail");
        };
        assert!(matches!(err, RunnerError::NotFound(_)));
    }

    #[test]
    fn test_garbled_manifest_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(dir.path(), &["noop"]);
        let id = JobId::from("j1");

        registry.create(&id, &JobSpec::new("body")).unwrap();
        fs::write(dir.path().join("j1").join(MANIFEST_FILE), "{not json").unwrap();

        let Err(err) = registry.resolve(&id) else {
            panic!("expected resolve to fail");
        };
        assert!(matches!(err, RunnerError::NotFound(_)));
    }

    #[test]
    fn test_default_runner_used_when_manifest_names_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = JobRegistry::new(dir.path());
        registry.register_default(Arc::new(StaticFactory { name: "fallback" }));
        let id = JobId::from("j1");

        registry.create(&id, &JobSpec::new("body")).unwrap();
        assert!(registry.resolve(&id).is_ok());
    }

    #[test]
    fn test_remove_missing_is_explicit_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(dir.path(), &["noop"]);
        let err = registry.remove(&JobId::from("ghost")).unwrap_err();
        assert!(matches!(err, RunnerError::NotFound(_)));
    }

    #[test]
    fn test_remove_then_resolve_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(dir.path(), &["noop"]);
        let id = JobId::from("j1");

        registry
            .create(&id, &JobSpec::new("body").with_runner("noop"))
            .unwrap();
        registry.remove(&id).unwrap();

        assert!(!registry.contains(&id));
        assert!(matches!(
            registry.resolve(&id),
            Err(RunnerError::NotFound(_))
        ));
    }
}
