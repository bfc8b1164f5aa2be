//! Job-level result aggregation.
//!
//! Combines per-item outcomes into one [`JobOutcome`] and sweeps empty
//! directories out of the engine output root afterwards.

use std::path::Path;

use serde::Serialize;

use crate::artifact::ProcessedArtifact;

/// Terminal job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    PartialSuccess,
    Warning,
    Error,
}

/// The job-level result of output processing.
#[derive(Debug, Serialize)]
pub struct JobOutcome {
    pub status: JobStatus,
    pub message: String,
    pub outputs: Vec<ProcessedArtifact>,
    pub processing_errors: Vec<String>,
}

/// Combine per-item outcomes.
///
/// - zero artifacts, zero errors  -> `warning` (nothing processable)
/// - zero errors, >=1 artifact    -> `success`
/// - >=1 error, >=1 artifact      -> `partial_success`
/// - >=1 error, zero artifacts    -> `error`
pub fn aggregate(artifacts: Vec<ProcessedArtifact>, errors: Vec<String>) -> JobOutcome {
    let (status, message) = match (artifacts.is_empty(), errors.is_empty()) {
        (true, true) => (
            JobStatus::Warning,
            "No processable outputs found.".to_string(),
        ),
        (false, true) => (
            JobStatus::Success,
            "All outputs processed successfully.".to_string(),
        ),
        (false, false) => (
            JobStatus::PartialSuccess,
            format!("Processed outputs with {} errors.", errors.len()),
        ),
        (true, false) => (
            JobStatus::Error,
            format!("Processed outputs with {} errors.", errors.len()),
        ),
    };

    tracing::info!(
        status = ?status,
        artifacts = artifacts.len(),
        errors = errors.len(),
        "Output processing aggregated",
    );

    JobOutcome {
        status,
        message,
        outputs: artifacts,
        processing_errors: errors,
    }
}

/// Remove empty directories left behind under the output root.
///
/// Bottom-up sweep; a directory that is non-empty, vanished, or
/// permission-denied is simply left in place. The root itself is never
/// removed.
pub fn prune_empty_dirs(root: &Path) {
    let Ok(entries) = std::fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            prune_tree(&path);
        }
    }
}

fn prune_tree(dir: &Path) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                prune_tree(&path);
            }
        }
    }
    match std::fs::remove_dir(dir) {
        Ok(()) => tracing::debug!(path = %dir.display(), "Removed empty directory"),
        Err(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::media::MediaKind;

    fn artifact(url: &str) -> ProcessedArtifact {
        ProcessedArtifact {
            url: url.to_string(),
            media_type: MediaKind::Image,
            thumbnail_url: None,
            blurred_url: None,
        }
    }

    #[test]
    fn empty_everything_is_a_warning() {
        let outcome = aggregate(vec![], vec![]);
        assert_eq!(outcome.status, JobStatus::Warning);
    }

    #[test]
    fn artifacts_without_errors_is_success() {
        let outcome = aggregate(vec![artifact("u1")], vec![]);
        assert_eq!(outcome.status, JobStatus::Success);
    }

    #[test]
    fn mixed_results_are_partial_success() {
        let outcome = aggregate(vec![artifact("u1")], vec!["boom".into()]);
        assert_eq!(outcome.status, JobStatus::PartialSuccess);
        assert_eq!(outcome.outputs.len(), 1);
        assert_eq!(outcome.processing_errors.len(), 1);
    }

    #[test]
    fn only_errors_is_an_error() {
        let outcome = aggregate(vec![], vec!["boom".into()]);
        assert_eq!(outcome.status, JobStatus::Error);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::PartialSuccess).unwrap();
        assert_eq!(json, "\"partial_success\"");
    }

    #[test]
    fn prune_removes_nested_empty_dirs_and_keeps_files() {
        let base = std::env::temp_dir().join(format!("relay-prune-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(base.join("a/b/c")).unwrap();
        std::fs::create_dir_all(base.join("keep")).unwrap();
        std::fs::write(base.join("keep/file.txt"), b"x").unwrap();

        prune_empty_dirs(&base);

        assert!(!base.join("a").exists(), "empty tree should be removed");
        assert!(base.join("keep/file.txt").exists());
        assert!(base.exists(), "root itself is never removed");

        std::fs::remove_dir_all(&base).unwrap();
    }

    #[test]
    fn prune_on_missing_root_is_a_no_op() {
        prune_empty_dirs(Path::new("/nonexistent/relay-prune-root"));
    }
}
