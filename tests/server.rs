//! HTTP API tests driven through the router without binding a socket.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use common::{handbook_pdf, HashEmbedder, ScriptedGenerator};
use policy_rag::answer::NOT_FOUND;
use policy_rag::config::Config;
use policy_rag::embedding::DisabledProvider;
use policy_rag::server::router;
use policy_rag::store::InMemoryIndex;
use policy_rag::PolicyAssistant;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn app(tmp: &TempDir) -> axum::Router {
    let mut config = Config::with_db_path(tmp.path().join("unused.sqlite"));
    config.ingest.documents_dir = tmp.path().join("uploads");
    config.retrieval.query_expansion = false;
    let assistant = PolicyAssistant::new(
        &config,
        Arc::new(HashEmbedder::new()),
        Arc::new(InMemoryIndex::new("policy_documents")),
        Arc::new(ScriptedGenerator::answering("Economy class.")),
    )
    .unwrap();
    router(Arc::new(assistant))
}

async fn call(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = call(&app(&tmp), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_query_on_empty_index() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = call(
        &app(&tmp),
        "POST",
        "/api/query",
        Some(json!({ "question": "What is the travel policy?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], NOT_FOUND);
    assert_eq!(body["confidence"], "Low");
    assert_eq!(body["context_chunks"], 0);
    assert_eq!(body["sources"], json!([]));
}

#[tokio::test]
async fn test_empty_question_rejected() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = call(
        &app(&tmp),
        "POST",
        "/api/query",
        Some(json!({ "question": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("must not be empty"));
}

#[tokio::test]
async fn test_ingest_then_stats_then_query() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("uploads")).unwrap();
    std::fs::write(tmp.path().join("uploads/handbook.pdf"), handbook_pdf()).unwrap();
    let app = app(&tmp);

    let (status, report) = call(&app, "POST", "/api/ingest", Some(json!({ "clear": true }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["collection_name"], "policy_documents");
    assert_eq!(report["files"][0]["filename"], "handbook.pdf");
    let total = report["total_chunks_indexed"].as_u64().unwrap();
    assert!(total > 0);

    let (status, stats) = call(&app, "GET", "/api/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_chunks"].as_u64().unwrap(), total);

    let (status, answer) = call(
        &app,
        "POST",
        "/api/query",
        Some(json!({ "question": "Economy class airfare is provided for domestic business travel" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(answer["answer"], "Economy class.");
    assert_eq!(answer["sources"][0]["page"], 3);
    assert_eq!(answer["sources"][0]["document"], "handbook.pdf");
}

#[tokio::test]
async fn test_ingest_explicit_paths() {
    let tmp = TempDir::new().unwrap();
    let pdf = tmp.path().join("travel.pdf");
    std::fs::write(&pdf, handbook_pdf()).unwrap();

    let (status, report) = call(
        &app(&tmp),
        "POST",
        "/api/ingest",
        Some(json!({ "paths": [pdf] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["files"][0]["filename"], "travel.pdf");
    assert!(report["files"][0]["error"].is_null());
}

#[tokio::test]
async fn test_ingest_missing_documents_dir() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = call(&app(&tmp), "POST", "/api/ingest", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("documents directory not found"));
}

#[tokio::test]
async fn test_query_with_embeddings_disabled() {
    let tmp = TempDir::new().unwrap();
    let config = Config::with_db_path(tmp.path().join("unused.sqlite"));
    let assistant = PolicyAssistant::new(
        &config,
        Arc::new(DisabledProvider),
        Arc::new(InMemoryIndex::new("policy_documents")),
        Arc::new(ScriptedGenerator::answering("unused")),
    )
    .unwrap();
    let app = router(Arc::new(assistant));

    let (status, body) = call(
        &app,
        "POST",
        "/api/query",
        Some(json!({ "question": "How much annual leave?" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "embeddings_disabled");
}
