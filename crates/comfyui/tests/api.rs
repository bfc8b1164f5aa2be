//! Integration tests for the ComfyUI REST client against a mock server.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;

use common::{spawn_engine, MockPoll};
use relay_comfyui::api::{ComfyApi, ComfyApiError};

#[tokio::test]
async fn readiness_succeeds_against_live_server() {
    let url = spawn_engine(vec![MockPoll::NotFound]).await;
    let api = ComfyApi::new(url);
    api.check_ready(Duration::from_millis(10), 5).await.unwrap();
}

#[tokio::test]
async fn readiness_exhausts_budget_when_unreachable() {
    let api = ComfyApi::new("http://127.0.0.1:9".to_string());
    let err = api
        .check_ready(Duration::from_millis(10), 3)
        .await
        .unwrap_err();
    assert_matches!(err, ComfyApiError::NotReady { attempts: 3, .. });
}

#[tokio::test]
async fn submit_returns_prompt_id() {
    let url = spawn_engine(vec![MockPoll::NotFound]).await;
    let api = ComfyApi::new(url);
    let response = api
        .submit_workflow(&json!({ "1": { "class_type": "KSampler" } }), "client-1")
        .await
        .unwrap();
    assert_eq!(response.prompt_id, "prompt-1");
    assert_eq!(response.number, 1);
}

#[tokio::test]
async fn history_404_means_not_registered() {
    let url = spawn_engine(vec![MockPoll::NotFound]).await;
    let api = ComfyApi::new(url);
    let entry = api.get_history("prompt-1").await.unwrap();
    assert!(entry.is_none());
}

#[tokio::test]
async fn history_payload_without_prompt_id_means_not_registered() {
    let url = spawn_engine(vec![MockPoll::Body(json!({}))]).await;
    let api = ComfyApi::new(url);
    let entry = api.get_history("prompt-1").await.unwrap();
    assert!(entry.is_none());
}

#[tokio::test]
async fn history_returns_typed_entry() {
    let url = spawn_engine(vec![MockPoll::Body(json!({
        "prompt-1": {
            "outputs": { "9": { "images": [{ "filename": "a.png" }] } },
            "status": { "status_str": "success", "completed": true, "messages": [] },
        },
    }))])
    .await;
    let api = ComfyApi::new(url);
    let entry = api.get_history("prompt-1").await.unwrap().unwrap();
    assert!(entry.completed_flag());
    assert_eq!(entry.outputs.len(), 1);
}

#[tokio::test]
async fn upload_asset_accepts_bytes() {
    let url = spawn_engine(vec![MockPoll::NotFound]).await;
    let api = ComfyApi::new(url);
    api.upload_asset("input.png", vec![1, 2, 3]).await.unwrap();
}
