//! Typed `/history/{prompt_id}` payloads and output classification.
//!
//! The engine reports one history entry per prompt with the shape
//! `{"outputs": {<node_id>: {"images"|"videos"|"gifs": [descriptor...]}},
//! "status": {"status_str", "completed", "messages"}}`. This module
//! deserializes that into [`HistoryEntry`], extracts the error-of-record
//! when execution failed, and flattens the per-node output lists into an
//! ordered sequence of [`OutputRef`]s for the artifact pipeline.

use serde::Deserialize;
use serde_json::Value;

use relay_core::media::{is_scratch_output, MediaKind};

/// Output lists that can appear under one node, keyed by media family.
const OUTPUT_LIST_KEYS: &[(&str, MediaKind)] = &[
    ("images", MediaKind::Image),
    ("videos", MediaKind::Video),
    ("gifs", MediaKind::Gif),
];

/// Execution status block of a history entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionStatus {
    /// Engine status string: `pending`, `running`, `error`, `success`,
    /// or an unrecognized terminal value.
    pub status_str: Option<String>,
    /// The engine's own completion flag.
    pub completed: Option<bool>,
    /// Status messages, each `[<type>, {<data>}]`.
    #[serde(default)]
    pub messages: Vec<Value>,
}

/// One history entry for a prompt.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    /// Raw outputs keyed by node ID, in the engine's reporting order.
    #[serde(default)]
    pub outputs: serde_json::Map<String, Value>,
    #[serde(default)]
    pub status: Option<ExecutionStatus>,
    /// Workflow-level error report, free-text or structured.
    #[serde(default)]
    pub error: Option<Value>,
}

/// Raw per-file descriptor inside a node's output list.
#[derive(Debug, Clone, Deserialize)]
struct RawDescriptor {
    filename: Option<String>,
    #[serde(default)]
    subfolder: String,
    /// Engine-reported kind: `output` or `temp`.
    #[serde(rename = "type", default = "default_descriptor_type")]
    reported_type: String,
    fullpath: Option<String>,
}

fn default_descriptor_type() -> String {
    "output".to_string()
}

/// One deliverable output file, classified and ready for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRef {
    /// Node that produced the file.
    pub node_id: String,
    pub filename: String,
    /// Subdirectory under the engine output root, possibly empty.
    pub subfolder: String,
    /// Media-kind hint taken from which list the descriptor came from.
    pub kind_hint: MediaKind,
    /// Engine-supplied absolute path, when present (videos/gifs).
    pub fullpath: Option<String>,
}

impl HistoryEntry {
    /// Whether the engine reports this entry as terminal.
    ///
    /// True when the completion flag is set or the status string is a
    /// value other than `pending`/`running`.
    pub fn is_terminal(&self) -> bool {
        let Some(status) = &self.status else {
            return false;
        };
        if status.completed == Some(true) {
            return true;
        }
        matches!(
            status.status_str.as_deref(),
            Some(s) if !s.is_empty() && s != "pending" && s != "running"
        )
    }

    /// Whether the engine's own completion flag is set.
    pub fn completed_flag(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.completed == Some(true))
    }

    /// Engine status string, when reported.
    pub fn status_str(&self) -> Option<&str> {
        self.status.as_ref()?.status_str.as_deref()
    }
}

/// Extract the error-of-record from a history entry, if any.
///
/// Workflow-level signals win over node-level ones: a top-level `error`
/// field or an `error` status (with its `execution_error` message) is
/// the error-of-record; only absent those is the first per-node error
/// used, tagged with its node ID.
pub fn error_of_record(entry: &HistoryEntry) -> Option<String> {
    if let Some(error) = &entry.error {
        return Some(stringify_error(error));
    }

    if let Some(status) = &entry.status {
        if status.status_str.as_deref() == Some("error") {
            return Some(
                status_error_message(&status.messages)
                    .unwrap_or_else(|| "workflow reported error status".to_string()),
            );
        }
    }

    first_node_error(&entry.outputs)
}

/// Pull the human-readable message out of an `execution_error` status
/// message, tagged with the failing node when known.
fn status_error_message(messages: &[Value]) -> Option<String> {
    for message in messages {
        let Some(parts) = message.as_array() else {
            continue;
        };
        let [kind, data] = parts.as_slice() else {
            continue;
        };
        if kind.as_str() != Some("execution_error") {
            continue;
        }
        let detail = data
            .get("exception_message")
            .and_then(Value::as_str)
            .unwrap_or("unknown execution error");
        return Some(match data.get("node_id").and_then(Value::as_str) {
            Some(node_id) => format!("Node {node_id}: {detail}"),
            None => detail.to_string(),
        });
    }
    None
}

/// Scan node outputs in order for an `errors`/`error` field and return
/// the first one found, tagged with its node ID.
fn first_node_error(outputs: &serde_json::Map<String, Value>) -> Option<String> {
    for (node_id, node_output) in outputs {
        let error = node_output
            .get("errors")
            .and_then(|e| e.as_array())
            .and_then(|e| e.first())
            .or_else(|| node_output.get("error"));
        if let Some(error) = error {
            return Some(format!("Node {node_id}: {}", stringify_error(error)));
        }
    }
    None
}

fn stringify_error(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flatten raw node outputs into an ordered sequence of [`OutputRef`]s.
///
/// Order is node insertion order, then list order within a node; this
/// becomes the artifact processing order. Descriptors with a missing
/// filename, a scratch-file marker, or reported type `temp` are dropped
/// silently -- they are intermediate, non-deliverable artifacts.
pub fn collect_outputs(outputs: &serde_json::Map<String, Value>) -> Vec<OutputRef> {
    let mut refs = Vec::new();

    for (node_id, node_output) in outputs {
        for (key, kind_hint) in OUTPUT_LIST_KEYS {
            let Some(items) = node_output.get(*key).and_then(Value::as_array) else {
                continue;
            };
            for item in items {
                let Ok(descriptor) = serde_json::from_value::<RawDescriptor>(item.clone()) else {
                    tracing::warn!(node_id = %node_id, ?item, "Skipping malformed output descriptor");
                    continue;
                };
                let Some(filename) = descriptor.filename else {
                    continue;
                };
                if is_scratch_output(&filename, &descriptor.reported_type) {
                    tracing::debug!(
                        node_id = %node_id,
                        filename = %filename,
                        reported_type = %descriptor.reported_type,
                        "Skipping engine scratch file",
                    );
                    continue;
                }
                refs.push(OutputRef {
                    node_id: node_id.clone(),
                    filename,
                    subfolder: descriptor.subfolder,
                    kind_hint: *kind_hint,
                    fullpath: descriptor.fullpath,
                });
            }
        }
    }

    refs
}
