//! Shared JSON-over-HTTP call with retry and exponential backoff.
//!
//! Used by the remote embedding and generation backends:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

/// Send the request produced by `build` until it succeeds or retries run out.
///
/// `build` is called once per attempt because a sent request cannot be
/// reused. Errors are returned as display strings; callers wrap them in the
/// error variant of their own layer.
pub(crate) async fn post_json_with_retry<F>(
    build: F,
    max_retries: u32,
    label: &str,
) -> Result<serde_json::Value, String>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(label, attempt, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| format!("{} returned invalid JSON: {}", label, e));
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(format!("{} API error {}: {}", label, status, body_text));
                    continue;
                }

                return Err(format!("{} API error {}: {}", label, status, body_text));
            }
            Err(e) => {
                last_err = Some(format!("{} connection error: {}", label, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| format!("{} request failed after retries", label)))
}

pub(crate) fn client(timeout_secs: u64) -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Stub {
        statuses: Vec<u16>,
        hits: AtomicUsize,
    }

    async fn reply(State(stub): State<Arc<Stub>>) -> (StatusCode, Json<Value>) {
        let n = stub.hits.fetch_add(1, Ordering::SeqCst);
        let code = stub.statuses[n.min(stub.statuses.len() - 1)];
        let status = StatusCode::from_u16(code).unwrap();
        if status.is_success() {
            (status, Json(json!({ "attempt": n + 1 })))
        } else {
            (status, Json(json!({ "error": "stubbed failure" })))
        }
    }

    /// Serve the given status codes in order, repeating the last one.
    async fn serve(statuses: &[u16]) -> (String, Arc<Stub>) {
        let stub = Arc::new(Stub {
            statuses: statuses.to_vec(),
            hits: AtomicUsize::new(0),
        });
        let app = Router::new()
            .route("/v1/test", post(reply))
            .with_state(stub.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/v1/test", addr), stub)
    }

    async fn call(url: &str, max_retries: u32) -> Result<Value, String> {
        let client = client(5).unwrap();
        post_json_with_retry(|| client.post(url).json(&json!({})), max_retries, "Stub").await
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let (url, stub) = serve(&[503, 200]).await;
        let body = call(&url, 2).await.unwrap();
        assert_eq!(body["attempt"], 2);
        assert_eq!(stub.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_error_fails_without_retry() {
        let (url, stub) = serve(&[400, 200]).await;
        let err = call(&url, 3).await.unwrap_err();
        assert!(err.contains("400"), "{err}");
        assert!(err.contains("stubbed failure"), "{err}");
        assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_retries_until_exhausted() {
        let (url, stub) = serve(&[429]).await;
        let err = call(&url, 1).await.unwrap_err();
        assert!(err.contains("429"), "{err}");
        assert_eq!(stub.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_retries_makes_one_attempt() {
        let (url, stub) = serve(&[500]).await;
        assert!(call(&url, 0).await.is_err());
        assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
    }
}
