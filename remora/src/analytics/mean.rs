use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::config::SearchPaging;
use crate::job::{Job, JobFactory, JobSpec};
use crate::store::DocumentStore;

/// Parameters for the whole-set mean job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeanParams {
    /// Collection holding the input documents.
    pub collection: String,
    /// Document field carrying the values.
    pub field: String,
    /// Page size override for this job's searches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
}

/// Stateless job computing the arithmetic mean of one field across the
/// whole collection.
///
/// Ignores its prior config; the result summary is returned as the new
/// config so the last computed mean is visible on the job record.
#[derive(Debug)]
pub struct MeanJob {
    params: MeanParams,
    paging: SearchPaging,
}

impl MeanJob {
    pub fn new(params: MeanParams, paging: SearchPaging) -> Self {
        Self { params, paging }
    }
}

#[async_trait]
impl Job for MeanJob {
    async fn run(
        &mut self,
        store: &dyn DocumentStore,
        _prior: Value,
    ) -> anyhow::Result<Option<Value>> {
        let mut sum = 0.0f64;
        let mut count = 0u64;

        let page_size = self.params.page_size.unwrap_or(self.paging.page_size);
        super::scan_field(
            store,
            &self.params.collection,
            &self.params.field,
            page_size,
            self.paging.keep_alive_secs,
            |value| {
                if let Some(v) = value.as_f64() {
                    sum += v;
                    count += 1;
                }
            },
        )
        .await?;

        let mean = if count > 0 {
            Some(sum / count as f64)
        } else {
            None
        };
        info!(
            collection = %self.params.collection,
            field = %self.params.field,
            count,
            mean = ?mean,
            "mean pass complete"
        );

        Ok(Some(json!({ "mean": mean, "count": count })))
    }
}

/// Factory for [`MeanJob`], registered as `mean`.
#[derive(Clone, Debug)]
pub struct MeanFactory {
    paging: SearchPaging,
}

impl MeanFactory {
    pub fn new(paging: SearchPaging) -> Self {
        Self { paging }
    }
}

impl JobFactory for MeanFactory {
    fn name(&self) -> &'static str {
        "mean"
    }

    fn build(&self, spec: &JobSpec) -> anyhow::Result<Box<dyn Job>> {
        let params: MeanParams = serde_json::from_value(spec.params.clone())
            .map_err(|err| anyhow::anyhow!("invalid mean params: {err}"))?;
        Ok(Box::new(MeanJob::new(params, self.paging)))
    }
}
