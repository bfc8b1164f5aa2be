//! Serverless worker entry point.
//!
//! The dispatcher hands this process one job at a time: a JSON document
//! `{"id": <job id>, "input": <payload>}` read from the path given as
//! the first argument, or from stdin when no argument is given. The job
//! result is written to stdout as a single JSON document.

use std::io::Read;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_comfyui::api::ComfyApi;
use relay_comfyui::input::PassthroughNormalizer;
use relay_core::config::WorkerConfig;
use relay_storage::s3::{S3Config, S3ObjectStore};
use relay_storage::{ObjectStore, UnconfiguredStore};
use relay_worker::handler::{error_result, run_job};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    tracing::info!(comfy_host = %config.comfy_host, "Worker starting");

    let job = read_job()?;
    let job_id = job
        .get("id")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("unknown_job")
        .to_string();
    let payload = job
        .get("input")
        .cloned()
        .unwrap_or(serde_json::Value::Null);

    // Clients are constructed once per process and shared read-only.
    let api = Arc::new(ComfyApi::new(config.comfy_url()));
    let http = reqwest::Client::new();
    let store: Arc<dyn ObjectStore> = match S3Config::from_env() {
        Some(bucket) => Arc::new(S3ObjectStore::connect(&bucket).await?),
        None => {
            tracing::warn!("Bucket credentials not configured; uploads will fail");
            Arc::new(UnconfiguredStore)
        }
    };

    // The job boundary: a panic inside the handler becomes a generic
    // error result instead of a crashed worker.
    let result = {
        let config_task = config.clone();
        let api = Arc::clone(&api);
        let store = Arc::clone(&store);
        let job_id = job_id.clone();
        let task = tokio::spawn(async move {
            run_job(
                &config_task,
                &api,
                &http,
                store.as_ref(),
                &PassthroughNormalizer,
                &job_id,
                &payload,
            )
            .await
        });
        match task.await {
            Ok(result) => result,
            Err(e) => error_result(
                &config,
                relay_core::error::CoreError::Internal(e.to_string()),
            ),
        }
    };

    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

/// Read the job document from the first CLI argument or stdin.
fn read_job() -> anyhow::Result<serde_json::Value> {
    let raw = match std::env::args().nth(1) {
        Some(path) => {
            std::fs::read_to_string(&path).with_context(|| format!("reading job file {path}"))?
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading job from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("job document is not valid JSON")
}
