//! Job-level error taxonomy.
//!
//! These are the errors that abort a job outright. Item-level errors
//! (one output file failing to process) live in the pipeline crate and
//! never surface through this enum.

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The job payload failed validation. Fatal, no engine call is made.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The engine never answered its liveness probe within the budget.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// One or more input assets could not be staged into the engine.
    #[error("Input image staging failed: {0}")]
    InputStaging(String),

    /// The engine rejected the workflow graph at submission.
    #[error("Failed to queue workflow: {0}")]
    Submission(String),

    /// The engine reported that the workflow itself failed. Not retried.
    #[error("Workflow execution failed: {0}")]
    WorkflowExecution(String),

    /// The job exceeded its wall-clock deadline.
    #[error("Job processing timed out after {0} seconds")]
    Timeout(u64),

    /// Anything unexpected caught at the job boundary.
    #[error("An unexpected error occurred: {0}")]
    Internal(String),
}
