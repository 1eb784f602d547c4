use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::config::SearchPaging;
use crate::job::{Job, JobFactory, JobSpec};
use crate::store::DocumentStore;

/// Incrementally maintained mean over the most recent `window` values.
///
/// Each accepted value contributes `value / window` to a circular buffer.
/// While the buffer is filling nothing is emitted; once it is full, every
/// further value overwrites the oldest contribution and emits the updated
/// running sum, which equals the mean of the last `window` raw values.
///
/// The buffer, cursor, and window size round-trip through
/// [`MovingMeanState`], so a calculator restored from saved state continues
/// the stream exactly where it left off: the emitted sequence is
/// independent of how the input was chunked into batches.
#[derive(Clone, Debug)]
pub struct MovingMean {
    slots: Vec<f64>,
    cursor: usize,
    window: usize,
    sum: f64,
    emitted: Vec<f64>,
}

/// Serializable snapshot of a [`MovingMean`].
///
/// Holds only what resumption needs: the contribution slots, the oldest-slot
/// cursor, and the window size. The running sum is derived on restore; the
/// emitted sequence belongs to the run that produced it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MovingMeanState {
    pub slots: Vec<f64>,
    pub cursor: usize,
    pub window: usize,
}

impl MovingMean {
    /// Create an empty calculator. A window of zero is treated as one.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            slots: Vec::with_capacity(window),
            cursor: 0,
            window,
            sum: 0.0,
            emitted: Vec::new(),
        }
    }

    /// Restore a calculator from saved state.
    pub fn from_state(state: MovingMeanState) -> Self {
        let window = state.window.max(1);
        let mut slots = state.slots;
        slots.truncate(window);
        let sum = slots.iter().sum();
        let cursor = if slots.len() == window {
            state.cursor % window
        } else {
            0
        };
        Self {
            slots,
            cursor,
            window,
            sum,
            emitted: Vec::new(),
        }
    }

    /// Snapshot the resumable state.
    pub fn state(&self) -> MovingMeanState {
        MovingMeanState {
            slots: self.slots.clone(),
            cursor: self.cursor,
            window: self.window,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Means emitted so far by this calculator instance, in input order.
    pub fn emitted(&self) -> &[f64] {
        &self.emitted
    }

    /// Feed a raw document field value. Null and non-numeric values are
    /// skipped without any state change.
    pub fn push(&mut self, value: &Value) {
        if let Some(v) = numeric(value) {
            self.push_value(v);
        }
    }

    /// Feed the next numeric value in stream order.
    pub fn push_value(&mut self, value: f64) {
        let contrib = value / self.window as f64;

        if self.slots.len() < self.window {
            // Still filling the window; nothing to emit yet.
            self.slots.push(contrib);
            self.sum += contrib;
        } else {
            self.sum -= self.slots[self.cursor];
            self.slots[self.cursor] = contrib;
            self.sum += contrib;
            self.cursor = (self.cursor + 1) % self.window;
            self.emitted.push(self.sum);
        }
    }
}

/// Coerce a document field value to f64. Accepts JSON numbers and numeric
/// strings; everything else is "cannot convert".
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Parameters for the moving mean job, taken from the artifact manifest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MovingMeanParams {
    /// Collection holding the input documents.
    pub collection: String,
    /// Document field carrying the values.
    pub field: String,
    /// Window size for a fresh calculator; saved state keeps its own.
    #[serde(default = "default_window")]
    pub window: usize,
    /// Page size override for this job's searches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
}

fn default_window() -> usize {
    3
}

/// Job computing a moving mean over one field of a collection.
///
/// Prior config, when present, is a [`MovingMeanState`] and seeds the
/// calculator; the state after the scan is returned as the new config.
#[derive(Debug)]
pub struct MovingMeanJob {
    params: MovingMeanParams,
    paging: SearchPaging,
}

impl MovingMeanJob {
    pub fn new(params: MovingMeanParams, paging: SearchPaging) -> Self {
        Self { params, paging }
    }
}

#[async_trait]
impl Job for MovingMeanJob {
    async fn run(
        &mut self,
        store: &dyn DocumentStore,
        prior: Value,
    ) -> anyhow::Result<Option<Value>> {
        let mut calc = match serde_json::from_value::<MovingMeanState>(prior) {
            Ok(state) => MovingMean::from_state(state),
            Err(_) => MovingMean::new(self.params.window),
        };

        let page_size = self.params.page_size.unwrap_or(self.paging.page_size);
        let visited = super::scan_field(
            store,
            &self.params.collection,
            &self.params.field,
            page_size,
            self.paging.keep_alive_secs,
            |value| calc.push(value),
        )
        .await?;

        info!(
            collection = %self.params.collection,
            field = %self.params.field,
            visited,
            emitted = calc.emitted().len(),
            "moving mean pass complete"
        );

        Ok(Some(serde_json::to_value(calc.state())?))
    }
}

/// Factory for [`MovingMeanJob`], registered as `moving_mean`.
#[derive(Clone, Debug)]
pub struct MovingMeanFactory {
    paging: SearchPaging,
}

impl MovingMeanFactory {
    pub fn new(paging: SearchPaging) -> Self {
        Self { paging }
    }
}

impl JobFactory for MovingMeanFactory {
    fn name(&self) -> &'static str {
        "moving_mean"
    }

    fn build(&self, spec: &JobSpec) -> anyhow::Result<Box<dyn Job>> {
        let params: MovingMeanParams = serde_json::from_value(spec.params.clone())
            .map_err(|err| anyhow::anyhow!("invalid moving_mean params: {err}"))?;
        Ok(Box::new(MovingMeanJob::new(params, self.paging)))
    }
}
