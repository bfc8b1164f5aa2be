//! ComfyUI HTTP client library.
//!
//! Provides the REST API wrapper (readiness check, input-asset upload,
//! workflow submission, history retrieval), typed history payloads with
//! output classification, and the completion polling state machine.

pub mod api;
pub mod history;
pub mod input;
pub mod poller;
