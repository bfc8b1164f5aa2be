//! Shared mock ComfyUI server for integration tests.
//!
//! Serves the four endpoints the client touches. History replies are
//! scripted per test: each poll consumes the next entry, and the last
//! entry repeats once the script is exhausted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

/// One scripted reply to a history poll.
#[derive(Clone)]
pub enum MockPoll {
    /// HTTP 404: the prompt has not registered yet.
    NotFound,
    /// HTTP 200 with this body as the full history map.
    Body(serde_json::Value),
}

#[derive(Clone)]
struct MockState {
    polls: Arc<Vec<MockPoll>>,
    hits: Arc<AtomicUsize>,
}

async fn liveness() -> &'static str {
    "ok"
}

async fn submit() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "prompt_id": "prompt-1", "number": 1 }))
}

async fn upload_image() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "name": "input.png", "subfolder": "", "type": "input" }))
}

async fn history(State(state): State<MockState>, Path(_id): Path<String>) -> Response {
    let index = state
        .hits
        .fetch_add(1, Ordering::SeqCst)
        .min(state.polls.len().saturating_sub(1));
    match &state.polls[index] {
        MockPoll::NotFound => StatusCode::NOT_FOUND.into_response(),
        MockPoll::Body(body) => Json(body.clone()).into_response(),
    }
}

/// Spawn a mock engine on an ephemeral port and return its base URL.
pub async fn spawn_engine(polls: Vec<MockPoll>) -> String {
    let state = MockState {
        polls: Arc::new(polls),
        hits: Arc::new(AtomicUsize::new(0)),
    };
    let app = Router::new()
        .route("/", get(liveness))
        .route("/prompt", post(submit))
        .route("/upload/image", post(upload_image))
        .route("/history/{id}", get(history))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
