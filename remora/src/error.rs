use thiserror::Error;

use crate::job::JobId;

/// Error classes surfaced by the runner core.
///
/// The classification matters more than the payload: `NotFound` aborts a
/// single invocation, `Serialization` is caught and logged without failing
/// the run, everything else propagates.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The job artifact is absent, unreadable, or names an unknown runner.
    #[error("job not found: {0}")]
    NotFound(JobId),

    /// The store could not encode a value it was asked to persist.
    #[error("config for job {job} could not be encoded by the store: {reason}")]
    Serialization { job: JobId, reason: String },

    /// The job logic itself failed mid-run. Nothing is written for this run.
    #[error("job {job} failed during execution: {source}")]
    Job {
        job: JobId,
        #[source]
        source: anyhow::Error,
    },

    /// A store operation failed for reasons other than encoding.
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),

    /// Artifact filesystem I/O failed.
    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RunnerError>;
