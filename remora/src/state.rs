use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{Result, RunnerError};
use crate::job::JobId;
use crate::store::{CollectionSchema, DocumentStore, EncodingError};

/// Document field holding the opaque job config.
pub(crate) const CONFIG_FIELD: &str = "config";

/// The persisted record of one job: when it last ran, and whatever state the
/// job chose to carry into its next invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobRecord {
    /// Start time of the most recent run.
    pub last_run: DateTime<Utc>,
    /// Opaque, job-owned config. Never interpreted by the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

/// Reads and writes job records in the document store, keyed by job id.
pub struct JobStateStore {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl JobStateStore {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// Collection name the records live in.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the records collection if absent, with the config field
    /// declared opaque so it is never indexed or searched.
    ///
    /// Idempotent; duplicate creation is a no-op on the store side.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.store
            .create_collection(
                &self.collection,
                CollectionSchema::default().with_opaque_field(CONFIG_FIELD),
            )
            .await
            .map_err(RunnerError::Store)
    }

    /// Load the prior config for a job.
    ///
    /// Returns `Value::Null` when the record, the collection, or the config
    /// field is missing. The three cases are indistinguishable on purpose:
    /// "never run" and "store not initialized" both mean "start empty".
    pub async fn load(&self, id: &JobId) -> Result<Value> {
        let doc = self
            .store
            .get(&self.collection, id.as_str())
            .await
            .map_err(RunnerError::Store)?;

        match doc.and_then(|mut doc| doc.get_mut(CONFIG_FIELD).map(Value::take)) {
            Some(config) => Ok(config),
            None => {
                info!(job_id = %id, "no stored config for job");
                Ok(Value::Null)
            }
        }
    }

    /// Upsert the job record.
    ///
    /// `last_run` is always written. When `new_config` is `None` the stored
    /// config, if any, is preserved rather than clobbered. Encoding failures
    /// on the store side surface as [`RunnerError::Serialization`].
    pub async fn save(
        &self,
        id: &JobId,
        last_run: DateTime<Utc>,
        new_config: Option<Value>,
    ) -> Result<()> {
        let config = match new_config {
            Some(config) => Some(config),
            None => self
                .store
                .get(&self.collection, id.as_str())
                .await
                .map_err(RunnerError::Store)?
                .and_then(|doc| doc.get(CONFIG_FIELD).cloned()),
        };

        let record = JobRecord { last_run, config };
        let doc = serde_json::to_value(&record).map_err(|err| RunnerError::Serialization {
            job: id.clone(),
            reason: err.to_string(),
        })?;

        match self.store.put(&self.collection, id.as_str(), doc).await {
            Ok(()) => Ok(()),
            Err(err) => match err.downcast_ref::<EncodingError>() {
                Some(encoding) => Err(RunnerError::Serialization {
                    job: id.clone(),
                    reason: encoding.0.clone(),
                }),
                None => Err(RunnerError::Store(err)),
            },
        }
    }

    /// Remove the job record. Returns whether a record was present.
    pub async fn remove(&self, id: &JobId) -> Result<bool> {
        self.store
            .delete(&self.collection, id.as_str())
            .await
            .map_err(RunnerError::Store)
    }
}

impl std::fmt::Debug for JobStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobStateStore")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_without_config_omits_field() {
        let record = JobRecord {
            last_run: Utc::now(),
            config: None,
        };
        let doc = serde_json::to_value(&record).unwrap();
        assert!(doc.get(CONFIG_FIELD).is_none());
    }

    #[test]
    fn test_record_roundtrips_config() {
        let record = JobRecord {
            last_run: Utc::now(),
            config: Some(json!({"slots": [1.0, 2.0], "cursor": 0, "window": 3})),
        };
        let doc = serde_json::to_value(&record).unwrap();
        let back: JobRecord = serde_json::from_value(doc).unwrap();
        assert_eq!(back.config, record.config);
        assert_eq!(back.last_run, record.last_run);
    }
}
