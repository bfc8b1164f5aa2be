//! One-job orchestration.
//!
//! [`run_job`] is the whole pipeline: validate the payload, wait for
//! the engine, stage input images, submit the workflow, poll it to a
//! terminal state, process every output item, and aggregate the result.
//! Job-level failures return a structured error result immediately;
//! item-level failures are collected and never abort the remaining
//! items.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use relay_comfyui::api::ComfyApi;
use relay_comfyui::history::collect_outputs;
use relay_comfyui::input::{upload_input_images, ImageNormalizer};
use relay_comfyui::poller::{wait_for_completion, PollConfig, PollOutcome};
use relay_core::config::WorkerConfig;
use relay_core::error::CoreError;
use relay_core::job::{validate_input, OutputOptions};
use relay_core::media::ThumbnailFormat;
use relay_pipeline::artifact::{process_output, ProcessedArtifact, ProcessorContext};
use relay_pipeline::derivative::ThumbnailSpec;
use relay_pipeline::outcome::{aggregate, prune_empty_dirs, JobStatus};
use relay_storage::ObjectStore;

/// The JSON document handed back to the dispatcher.
#[derive(Debug, Serialize)]
pub struct JobResult {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Job-level failure description. Present only when `status` is
    /// `error` and processing never produced partial results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub outputs: Vec<ProcessedArtifact>,
    pub processing_errors: Vec<String>,
    /// Raw engine outputs, attached for diagnostics when nothing was
    /// processable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_outputs: Option<serde_json::Map<String, Value>>,
    /// Whether the dispatcher should recycle this worker.
    pub refresh_worker: bool,
}

/// Run one job end to end. Never panics on bad input or engine
/// misbehavior -- every failure path produces a [`JobResult`].
pub async fn run_job(
    config: &WorkerConfig,
    api: &ComfyApi,
    http: &reqwest::Client,
    store: &dyn ObjectStore,
    normalizer: &dyn ImageNormalizer,
    job_id: &str,
    payload: &Value,
) -> JobResult {
    tracing::info!(job_id = %job_id, "Received job");

    // 1. Validate before any engine call is made.
    let request = match validate_input(payload) {
        Ok(request) => request,
        Err(e) => return error_result(config, e),
    };

    // 2. The engine must answer its liveness probe before use.
    if let Err(e) = api
        .check_ready(config.readiness_interval, config.readiness_max_retries)
        .await
    {
        return error_result(config, CoreError::Connectivity(e.to_string()));
    }

    // 3. Stage input images, if any.
    if let Err(e) = upload_input_images(api, http, &request.images, normalizer).await {
        return error_result(config, CoreError::InputStaging(e.to_string()));
    }

    // 4. Submit the workflow graph.
    let client_id = uuid::Uuid::new_v4().to_string();
    let submitted = match api.submit_workflow(&request.workflow, &client_id).await {
        Ok(response) => response,
        Err(e) => return error_result(config, CoreError::Submission(e.to_string())),
    };
    tracing::info!(
        job_id = %job_id,
        prompt_id = %submitted.prompt_id,
        queue_position = submitted.number,
        "Workflow queued",
    );

    // 5. Poll to a terminal state.
    let poll_config = PollConfig {
        interval: config.poll_interval,
        deadline: Duration::from_secs(config.job_timeout_secs),
    };
    let outputs = match wait_for_completion(api, &submitted.prompt_id, &poll_config).await {
        PollOutcome::Succeeded { outputs } => outputs,
        PollOutcome::Failed { error } => {
            return error_result(config, CoreError::WorkflowExecution(error))
        }
        PollOutcome::TimedOut => {
            return error_result(config, CoreError::Timeout(config.job_timeout_secs))
        }
    };

    // 6. Classify and process each deliverable output sequentially.
    let refs = collect_outputs(&outputs);
    tracing::info!(job_id = %job_id, count = refs.len(), "Processing output items");

    let ctx = ProcessorContext {
        store,
        job_id,
        output_root: Path::new(&config.output_root),
        alt_output_root: Path::new(&config.alt_output_root),
        thumbnail: thumbnail_spec(config, &request.options),
        blur_radius: blur_radius(config, &request.options),
    };

    let mut artifacts = Vec::new();
    let mut errors = Vec::new();
    for output in &refs {
        match process_output(&ctx, output).await {
            Ok(artifact) => artifacts.push(artifact),
            Err(e) => errors.push(e.to_string()),
        }
    }

    // 7. Aggregate and sweep leftovers.
    let outcome = aggregate(artifacts, errors);
    prune_empty_dirs(Path::new(&config.output_root));

    let raw_outputs = (outcome.status == JobStatus::Warning).then(|| outputs.clone());

    tracing::info!(job_id = %job_id, status = ?outcome.status, "Job finished");
    JobResult {
        status: outcome.status,
        message: Some(outcome.message),
        error: None,
        outputs: outcome.outputs,
        processing_errors: outcome.processing_errors,
        raw_outputs,
        refresh_worker: config.refresh_worker,
    }
}

/// Structured job-level failure.
pub fn error_result(config: &WorkerConfig, error: CoreError) -> JobResult {
    tracing::error!(error = %error, "Job failed");
    JobResult {
        status: JobStatus::Error,
        message: None,
        error: Some(error.to_string()),
        outputs: Vec::new(),
        processing_errors: Vec::new(),
        raw_outputs: None,
        refresh_worker: config.refresh_worker,
    }
}

/// Resolve thumbnail settings: job options win over worker defaults.
fn thumbnail_spec(config: &WorkerConfig, options: &OutputOptions) -> ThumbnailSpec {
    let default_format =
        ThumbnailFormat::parse(&config.thumbnail_format).unwrap_or(ThumbnailFormat::Jpeg);
    ThumbnailSpec {
        width: options.thumbnail_width.unwrap_or(config.thumbnail_width),
        quality: options.thumbnail_quality.unwrap_or(config.thumbnail_quality),
        format: options.thumbnail_format.unwrap_or(default_format),
    }
}

/// Blur is opt-in per job; the radius falls back to the worker default.
fn blur_radius(config: &WorkerConfig, options: &OutputOptions) -> Option<f32> {
    options
        .generate_blurred_image
        .then(|| options.blur_radius.unwrap_or(config.blur_radius))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WorkerConfig {
        let mut config = WorkerConfig::from_env();
        config.thumbnail_width = 320;
        config.thumbnail_quality = 80;
        config.thumbnail_format = "jpeg".into();
        config.blur_radius = 10.0;
        config
    }

    #[test]
    fn thumbnail_options_override_defaults() {
        let options = OutputOptions {
            thumbnail_width: Some(640),
            thumbnail_quality: Some(55),
            thumbnail_format: Some(ThumbnailFormat::Webp),
            ..Default::default()
        };
        let spec = thumbnail_spec(&config(), &options);
        assert_eq!(spec.width, 640);
        assert_eq!(spec.quality, 55);
        assert_eq!(spec.format, ThumbnailFormat::Webp);
    }

    #[test]
    fn thumbnail_defaults_apply_when_options_absent() {
        let spec = thumbnail_spec(&config(), &OutputOptions::default());
        assert_eq!(spec.width, 320);
        assert_eq!(spec.quality, 80);
        assert_eq!(spec.format, ThumbnailFormat::Jpeg);
    }

    #[test]
    fn blur_is_off_unless_requested() {
        assert_eq!(blur_radius(&config(), &OutputOptions::default()), None);

        let options = OutputOptions {
            generate_blurred_image: true,
            ..Default::default()
        };
        assert_eq!(blur_radius(&config(), &options), Some(10.0));

        let options = OutputOptions {
            generate_blurred_image: true,
            blur_radius: Some(3.5),
            ..Default::default()
        };
        assert_eq!(blur_radius(&config(), &options), Some(3.5));
    }
}
