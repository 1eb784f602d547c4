use std::fmt::Display;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::DocumentStore;

/// Identifier of a job.
///
/// The same string serves as the artifact lookup key, the document key of the
/// job record, and the log correlation key. No normalization is performed;
/// keeping the three uses consistent is the caller's responsibility.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Administrative payload for creating a job artifact.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobSpec {
    /// The job's source payload, stored verbatim in the artifact.
    pub code: String,
    /// Name of the registered runner that loads this job. The registry's
    /// default runner is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner: Option<String>,
    /// Runner-specific parameters, opaque to the registry.
    #[serde(default)]
    pub params: Value,
}

impl JobSpec {
    /// Create a spec with the given code payload and no runner override.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            runner: None,
            params: Value::Null,
        }
    }

    /// Set the runner name.
    pub fn with_runner(mut self, runner: impl Into<String>) -> Self {
        self.runner = Some(runner.into());
        self
    }

    /// Set the runner parameters.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// A loadable unit of analytic logic.
///
/// One run: the orchestrator calls [`Job::run`] with a store handle and the
/// job's prior config, and persists the returned config (when `Some`)
/// together with the run timestamp. The config payload is opaque to
/// everything but the job itself.
#[async_trait]
pub trait Job: Send + Sync {
    /// Execute one run against the store.
    ///
    /// `prior` is the config persisted by the previous run, or `Value::Null`
    /// when the job has never run (or its record is gone). Return `Some` to
    /// replace the stored config, `None` to leave it untouched.
    async fn run(
        &mut self,
        store: &dyn DocumentStore,
        prior: Value,
    ) -> anyhow::Result<Option<Value>>;
}

/// Builds [`Job`] instances from an artifact spec.
///
/// Factories are the statically-typed plugin boundary: the registry maps the
/// runner name in an artifact's manifest to a registered factory instead of
/// interpreting source text at load time.
pub trait JobFactory: Send + Sync {
    /// Runner name this factory is registered under.
    fn name(&self) -> &'static str;

    /// Build a job from the artifact spec.
    ///
    /// A build failure is reported by the registry as a not-found condition:
    /// the artifact exists but is not loadable.
    fn build(&self, spec: &JobSpec) -> anyhow::Result<Box<dyn Job>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_roundtrips_string() {
        let id = JobId::from("moving-mean-7");
        assert_eq!(id.as_str(), "moving-mean-7");
        assert_eq!(id.to_string(), "moving-mean-7");
    }

    #[test]
    fn test_job_spec_defaults_from_json() {
        let spec: JobSpec = serde_json::from_str(r#"{"code": "print()"}"#).unwrap();
        assert_eq!(spec.code, "print()");
        assert!(spec.runner.is_none());
        assert!(spec.params.is_null());
    }

    #[test]
    fn test_job_spec_serializes_without_absent_runner() {
        let spec = JobSpec::new("x = 1");
        let json = serde_json::to_value(&spec).unwrap();
        assert!(json.get("runner").is_none());
    }
}
