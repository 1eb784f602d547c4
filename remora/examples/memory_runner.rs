//! End-to-end example against the in-memory store from remora-testkit.
//!
//! Seeds a collection with temperature readings, creates a moving mean job,
//! runs it twice, and prints the state carried between the runs.

use std::sync::Arc;

use serde_json::json;
use tracing_subscriber::EnvFilter;

use remora::analytics::MovingMeanFactory;
use remora::{JobId, JobRegistry, JobRunner, JobSpec, JobStateStore, RunnerConfig};
use remora_testkit::{seed_field_docs, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let jobs_dir = tempfile::tempdir()?;
    let config = RunnerConfig::new(jobs_dir.path());
    let store = Arc::new(MemoryStore::new());

    seed_field_docs(
        &store,
        "sensor_readings",
        "val_temperature",
        &[json!(18.0), json!(21.0), json!(24.0), json!(27.0), json!(30.0)],
    )
    .await?;

    let mut registry = JobRegistry::new(&config.jobs_dir);
    registry.register(Arc::new(MovingMeanFactory::new(config.paging)));

    let states = JobStateStore::new(store.clone(), &config.records_collection);
    let runner = JobRunner::new(registry, states, store.clone());

    let id = JobId::from("temperature-trend");
    let spec = JobSpec::new("-- moving mean over val_temperature --")
        .with_runner("moving_mean")
        .with_params(json!({
            "collection": "sensor_readings",
            "field": "val_temperature",
            "window": 3,
        }));
    runner.create_job(&id, &spec)?;

    let report = runner.run(&id).await?;
    println!(
        "first run: elapsed {:?}, config updated: {}",
        report.elapsed, report.config_updated
    );
    println!("saved state: {}", runner.states().load(&id).await?);

    // A second run picks the state back up and continues the stream.
    let report = runner.run(&id).await?;
    println!(
        "second run: elapsed {:?}, persisted: {}",
        report.elapsed, report.persisted
    );
    println!("saved state: {}", runner.states().load(&id).await?);

    runner.delete_job(&id).await?;
    println!("job deleted");

    Ok(())
}
