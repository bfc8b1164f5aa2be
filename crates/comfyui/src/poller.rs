//! Completion polling state machine.
//!
//! Drives a submitted prompt to a terminal state:
//! `SUBMITTED -> POLLING -> {SUCCEEDED | FAILED | TIMED_OUT}`.
//!
//! Each cycle checks the wall-clock deadline *before* touching the
//! network, so a hung connection can never extend the timeout. Network
//! failures and not-yet-registered prompts keep the loop in `POLLING`;
//! only a positive error signal from the engine or the deadline itself
//! ends it early.

use std::time::{Duration, Instant};

use crate::api::ComfyApi;
use crate::history::error_of_record;

/// Polling knobs. Exact values are configuration, not semantics.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Fixed delay between poll cycles.
    pub interval: Duration,
    /// Wall-clock deadline measured from submission. The only authority
    /// for declaring the job timed out.
    pub deadline: Duration,
}

/// Terminal result of polling one prompt.
#[derive(Debug)]
pub enum PollOutcome {
    /// The engine completed the workflow. `outputs` is the last
    /// non-empty raw output map seen (possibly empty when the workflow
    /// legitimately produced nothing).
    Succeeded {
        outputs: serde_json::Map<String, serde_json::Value>,
    },
    /// The engine reported a workflow- or node-level error.
    Failed { error: String },
    /// The deadline elapsed without a terminal signal.
    TimedOut,
}

/// Poll the engine until the prompt reaches a terminal state.
pub async fn wait_for_completion(
    api: &ComfyApi,
    prompt_id: &str,
    config: &PollConfig,
) -> PollOutcome {
    tracing::info!(
        prompt_id = %prompt_id,
        deadline_secs = config.deadline.as_secs(),
        "Waiting for workflow completion",
    );

    let started = Instant::now();
    let mut retained_outputs = serde_json::Map::new();

    loop {
        // Deadline first: a hung history call must not extend the job.
        if started.elapsed() >= config.deadline {
            tracing::error!(
                prompt_id = %prompt_id,
                elapsed_secs = started.elapsed().as_secs(),
                "Polling deadline exceeded",
            );
            return PollOutcome::TimedOut;
        }

        match api.get_history(prompt_id).await {
            Err(e) => {
                // Transient by definition: retried until the deadline.
                tracing::warn!(prompt_id = %prompt_id, error = %e, "History poll failed, retrying");
            }
            Ok(None) => {
                tracing::debug!(prompt_id = %prompt_id, "Prompt not registered in history yet");
            }
            Ok(Some(entry)) => {
                // Outputs may be reported once and then disappear from
                // later polls of the same terminal state.
                if !entry.outputs.is_empty() {
                    retained_outputs = entry.outputs.clone();
                }

                if let Some(error) = error_of_record(&entry) {
                    tracing::error!(prompt_id = %prompt_id, error = %error, "Workflow failed");
                    return PollOutcome::Failed { error };
                }

                if entry.is_terminal() {
                    if !retained_outputs.is_empty() || entry.completed_flag() {
                        tracing::info!(
                            prompt_id = %prompt_id,
                            output_nodes = retained_outputs.len(),
                            "Workflow completed",
                        );
                        return PollOutcome::Succeeded {
                            outputs: retained_outputs,
                        };
                    }
                    // Terminal, but no outputs, no error, and no
                    // completion flag: fail closed rather than hang.
                    let status = entry.status_str().unwrap_or("unknown").to_string();
                    tracing::error!(
                        prompt_id = %prompt_id,
                        status = %status,
                        "Unhandled terminal status without outputs",
                    );
                    return PollOutcome::Failed {
                        error: format!(
                            "Unhandled terminal status '{status}' with no outputs and no error"
                        ),
                    };
                }
            }
        }

        tokio::time::sleep(config.interval).await;
    }
}
