//! Tracing instrumentation for the job runner.
//!
//! Span constructors and timing helpers used around job resolution,
//! execution, and record persistence. The job id doubles as the log
//! correlation key, so every span carries it.

use std::future::Future;
use tracing::{info_span, Instrument, Span};

/// Create a tracing span for job resolution.
#[must_use]
pub fn job_resolve_span(job_id: impl AsRef<str>) -> Span {
    info_span!(
        "remora.resolve",
        job_id = %job_id.as_ref(),
    )
}

/// Create a tracing span for one job run.
///
/// `run_id` distinguishes repeated runs of the same job in the logs.
#[must_use]
pub fn job_run_span(job_id: impl AsRef<str>, run_id: impl AsRef<str>) -> Span {
    info_span!(
        "remora.run",
        job_id = %job_id.as_ref(),
        run_id = %run_id.as_ref(),
    )
}

/// Create a tracing span for record persistence.
#[must_use]
pub fn job_persist_span(job_id: impl AsRef<str>) -> Span {
    info_span!(
        "remora.persist",
        job_id = %job_id.as_ref(),
    )
}

/// Instrument a future with a job run span.
pub fn instrument_run<F>(
    job_id: impl AsRef<str>,
    run_id: impl AsRef<str>,
    future: F,
) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let span = job_run_span(job_id, run_id);
    future.instrument(span)
}

/// Record the start of a job run for duration tracking.
///
/// Returns a handle to pass to [`record_run_end`].
pub fn record_run_start(job_id: impl AsRef<str>) -> RunTimingHandle {
    RunTimingHandle {
        job_id: job_id.as_ref().to_string(),
        start: std::time::Instant::now(),
    }
}

/// Record the end of a job run and log its duration.
pub fn record_run_end(handle: RunTimingHandle, status: impl AsRef<str>) -> std::time::Duration {
    let elapsed = handle.start.elapsed();
    tracing::info!(
        job_id = %handle.job_id,
        status = %status.as_ref(),
        elapsed_secs = elapsed.as_secs_f64(),
        "job run finished"
    );
    elapsed
}

/// Handle for tracking the duration of one job run.
#[derive(Debug)]
pub struct RunTimingHandle {
    job_id: String,
    start: std::time::Instant,
}

impl RunTimingHandle {
    /// Job id this handle was started for.
    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Elapsed time since the run started.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
