use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use remora::job::{Job, JobFactory, JobSpec};
use remora::store::DocumentStore;

/// Factory producing [`ScriptedJob`]s with a configurable result.
///
/// Every job built by one factory shares its state, so a test can inspect
/// the prior configs the runner passed in and change the scripted result
/// between runs.
#[derive(Clone)]
pub struct ScriptedFactory {
    name: &'static str,
    result: Arc<Mutex<Option<Value>>>,
    priors: Arc<Mutex<Vec<Value>>>,
}

impl ScriptedFactory {
    /// Factory whose jobs return no new config.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            result: Arc::new(Mutex::new(None)),
            priors: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Factory whose jobs return the given config on every run.
    pub fn with_result(name: &'static str, result: Value) -> Self {
        let factory = Self::new(name);
        *factory.result.lock() = Some(result);
        factory
    }

    /// Change the config returned by subsequent runs.
    pub fn set_result(&self, result: Option<Value>) {
        *self.result.lock() = result;
    }

    /// Prior configs observed by runs of this factory's jobs, in order.
    pub fn priors(&self) -> Vec<Value> {
        self.priors.lock().clone()
    }

    pub fn assert_run_count_eq(&self, expected: usize) {
        let actual = self.priors.lock().len();
        assert_eq!(actual, expected, "Expected {expected} runs, got {actual}");
    }
}

impl JobFactory for ScriptedFactory {
    fn name(&self) -> &'static str {
        self.name
    }

    fn build(&self, _spec: &JobSpec) -> anyhow::Result<Box<dyn Job>> {
        Ok(Box::new(ScriptedJob {
            result: Arc::clone(&self.result),
            priors: Arc::clone(&self.priors),
        }))
    }
}

/// Job that records the prior config it was invoked with and returns a
/// scripted result.
pub struct ScriptedJob {
    result: Arc<Mutex<Option<Value>>>,
    priors: Arc<Mutex<Vec<Value>>>,
}

#[async_trait]
impl Job for ScriptedJob {
    async fn run(
        &mut self,
        _store: &dyn DocumentStore,
        prior: Value,
    ) -> anyhow::Result<Option<Value>> {
        self.priors.lock().push(prior);
        Ok(self.result.lock().clone())
    }
}
