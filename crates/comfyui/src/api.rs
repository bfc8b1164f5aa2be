//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps the ComfyUI HTTP API (liveness, input-asset upload, workflow
//! submission, history retrieval) using [`reqwest`]. Each call carries its
//! own request timeout; the overall job deadline is enforced by the
//! poller, not here.

use std::time::Duration;

use serde::Deserialize;

use crate::history::HistoryEntry;

/// Timeout for the liveness probe. Kept short so a dead server fails an
/// attempt quickly instead of eating the retry budget.
const READY_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for one history poll.
const HISTORY_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for workflow submission.
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for one input-asset upload.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for a single ComfyUI instance.
pub struct ComfyApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by the ComfyUI `/prompt` endpoint after
/// successfully queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt. Correlates all
    /// later history polls back to this unit of work.
    pub prompt_id: String,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: i64,
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyApiError {
    /// The HTTP request itself failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The liveness probe never saw HTTP 200 within the retry budget.
    #[error("ComfyUI API at {url} not reachable after {attempts} attempts")]
    NotReady { url: String, attempts: u32 },
}

impl ComfyApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://127.0.0.1:8188`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    /// Base HTTP API URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Wait until the server answers the liveness probe with HTTP 200.
    ///
    /// Issues `GET /` up to `max_retries` times with `interval` between
    /// attempts. Connection errors and non-200 responses are ignored
    /// between attempts.
    pub async fn check_ready(
        &self,
        interval: Duration,
        max_retries: u32,
    ) -> Result<(), ComfyApiError> {
        tracing::info!(url = %self.api_url, "Checking ComfyUI API availability");

        for attempt in 0..max_retries {
            let probe = self
                .client
                .get(self.api_url.as_str())
                .timeout(READY_TIMEOUT)
                .send()
                .await;

            match probe {
                Ok(response) if response.status().is_success() => {
                    tracing::info!(url = %self.api_url, attempt, "ComfyUI API is reachable");
                    return Ok(());
                }
                Ok(_) | Err(_) => {}
            }

            tokio::time::sleep(interval).await;
        }

        tracing::error!(
            url = %self.api_url,
            attempts = max_retries,
            "ComfyUI API never became reachable",
        );
        Err(ComfyApiError::NotReady {
            url: self.api_url.clone(),
            attempts: max_retries,
        })
    }

    /// Submit a workflow for execution.
    ///
    /// Sends `POST /prompt` with the workflow graph and client ID.
    /// Returns the server-assigned `prompt_id` and queue position.
    pub async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .timeout(SUBMIT_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Returns `Ok(None)` when the prompt is not yet registered in the
    /// history (HTTP 404, or a 2xx payload that does not contain the
    /// prompt ID) -- callers treat this as "still running".
    pub async fn get_history(
        &self,
        prompt_id: &str,
    ) -> Result<Option<HistoryEntry>, ComfyApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .timeout(HISTORY_TIMEOUT)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let history: serde_json::Map<String, serde_json::Value> =
            Self::parse_response(response).await?;

        match history.get(prompt_id) {
            Some(entry) => {
                let entry: HistoryEntry =
                    serde_json::from_value(entry.clone()).map_err(|e| ComfyApiError::Api {
                        status: 200,
                        body: format!("Malformed history entry for {prompt_id}: {e}"),
                    })?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Push an input asset into the engine's input namespace.
    ///
    /// Sends `POST /upload/image` as multipart form data with fields
    /// `image` (the file) and `overwrite=true`.
    pub async fn upload_asset(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ComfyApiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(relay_core::media::content_type_for(filename))?;

        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("overwrite", "true");

        let response = self
            .client
            .post(format!("{}/upload/image", self.api_url))
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form)
            .send()
            .await?;

        Self::check_status(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyApiError::Api`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ComfyApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
