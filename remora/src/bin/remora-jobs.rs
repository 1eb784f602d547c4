//! Administrative entry point for the job runner: run, create, or delete a
//! job against a PostgreSQL-backed document store.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use remora::analytics::{MeanFactory, MovingMeanFactory};
use remora::persistence::PostgresDocumentStore;
use remora::{JobId, JobRegistry, JobRunner, JobSpec, JobStateStore, RunnerConfig, StoreConfig};

#[derive(Parser, Debug)]
#[command(name = "remora-jobs")]
#[command(version)]
#[command(about = "Job handling for the remora analytics runner")]
struct Args {
    /// Create the job with the chosen id, reading a JSON spec from stdin
    #[arg(short, long, conflicts_with = "delete")]
    create: bool,

    /// Delete the job with the chosen id
    #[arg(short, long)]
    delete: bool,

    /// Id of the job
    id: String,

    /// Store connection string
    #[arg(long, default_value = "postgres://localhost/remora")]
    store_url: String,

    /// Directory holding job artifacts
    #[arg(long, default_value = "jobs")]
    jobs_dir: PathBuf,

    /// Collection holding job records
    #[arg(long, default_value = "jobs")]
    records_collection: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = RunnerConfig::new(&args.jobs_dir)
        .with_records_collection(&args.records_collection);
    let store_config = StoreConfig {
        connection_string: args.store_url.clone(),
        ..StoreConfig::default()
    };

    let pool = PgPoolOptions::new()
        .max_connections(store_config.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(
            store_config.acquire_timeout_seconds,
        ))
        .connect(&store_config.connection_string)
        .await?;
    let store = Arc::new(PostgresDocumentStore::new(pool));
    store.ensure_tables().await?;

    let mut registry = JobRegistry::new(&config.jobs_dir);
    registry.register(Arc::new(MovingMeanFactory::new(config.paging)));
    registry.register(Arc::new(MeanFactory::new(config.paging)));

    let states = JobStateStore::new(store.clone(), &config.records_collection);
    let runner = JobRunner::new(registry, states, store);

    let id = JobId::from(args.id.as_str());

    if args.create {
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw)?;
        let spec: JobSpec = serde_json::from_str(&raw)?;
        if let Err(err) = runner.create_job(&id, &spec) {
            tracing::error!(job_id = %id, error = %err, "create failed");
            std::process::exit(1);
        }
    } else if args.delete {
        if let Err(err) = runner.delete_job(&id).await {
            tracing::error!(job_id = %id, error = %err, "delete failed");
            std::process::exit(1);
        }
    } else {
        match runner.run(&id).await {
            Ok(report) => {
                tracing::info!(
                    job_id = %report.job_id,
                    run_id = %report.run_id,
                    elapsed_secs = report.elapsed.as_secs_f64(),
                    config_updated = report.config_updated,
                    persisted = report.persisted,
                    "run complete"
                );
            }
            Err(err) => {
                tracing::error!(job_id = %id, error = %err, "run failed");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
