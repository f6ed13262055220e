//! Transport tests for [`GeminiClient`] against a local `generateContent` stub.
//!
//! The stub answers with a scripted sequence of HTTP statuses, then 200 with a
//! grounded reply, and records every hit.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::{json, Value};
use sitter::config::AgentConfig;
use sitter::gateway::{GatewayError, GeminiClient, ModelClient};
use sitter::models::KnowledgeBaseEntry;
use sitter::prompt::assemble_query;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const KEY_VAR: &str = "SITTER_GATEWAY_IT_API_KEY";
const KEY: &str = "test-key-123";

// ─── Stub server ────────────────────────────────────────────────────

#[derive(Default)]
struct Stub {
    /// Statuses for the first hits; later hits get 200.
    statuses: Vec<u16>,
    delay: Option<Duration>,
    hits: Mutex<Vec<Hit>>,
}

#[derive(Clone, Debug)]
struct Hit {
    path: String,
    api_key: Option<String>,
    body: Value,
}

async fn handle_generate(
    State(stub): State<Arc<Stub>>,
    uri: axum::http::Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let n = {
        let mut hits = stub.hits.lock().unwrap();
        hits.push(Hit {
            path: uri.path().to_string(),
            api_key: headers
                .get("x-goog-api-key")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body,
        });
        hits.len() - 1
    };

    if let Some(delay) = stub.delay {
        tokio::time::sleep(delay).await;
    }

    match stub.statuses.get(n) {
        Some(&status) if status != 200 => {
            let status = StatusCode::from_u16(status).unwrap();
            (status, Json(json!({ "error": { "code": status.as_u16() } }))).into_response()
        }
        _ => Json(json!({
            "candidates": [{
                "content": {
                    "parts": [{ "text": "{\"answerEnglish\":\"A\",\"answerChinese\":\"B\"}" }]
                },
                "groundingMetadata": {
                    "groundingChunks": [
                        { "web": { "uri": "https://experienceleague.adobe.com/x", "title": "Commerce" } }
                    ]
                }
            }]
        }))
        .into_response(),
    }
}

/// Serve `stub` on a free port and return its base URL.
async fn serve(stub: Arc<Stub>) -> String {
    let app = Router::new().fallback(handle_generate).with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}", addr)
}

fn client_for(base_url: String, max_retries: u32, timeout_secs: Option<u64>) -> GeminiClient {
    std::env::set_var(KEY_VAR, KEY);
    GeminiClient::new(&AgentConfig {
        model: "gemini-test".to_string(),
        base_url,
        api_key_env: KEY_VAR.to_string(),
        search_grounding: true,
        max_retries,
        timeout_secs,
    })
    .unwrap()
}

fn request() -> sitter::prompt::GenerateRequest {
    assemble_query::<KnowledgeBaseEntry>("Taiwan", "Checkout fails", &[], &[], true)
}

fn hits(stub: &Stub) -> Vec<Hit> {
    stub.hits.lock().unwrap().clone()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_retries_server_error_then_succeeds() {
    let stub = Arc::new(Stub {
        statuses: vec![503],
        ..Default::default()
    });
    let client = client_for(serve(stub.clone()).await, 1, None);

    let started = Instant::now();
    let response = client.generate(&request()).await.unwrap();

    assert_eq!(
        response.text.as_deref(),
        Some("{\"answerEnglish\":\"A\",\"answerChinese\":\"B\"}")
    );
    assert_eq!(response.grounding.len(), 1);
    assert_eq!(
        response.grounding[0].uri.as_deref(),
        Some("https://experienceleague.adobe.com/x")
    );

    let hits = hits(&stub);
    assert_eq!(hits.len(), 2);
    // first backoff step is one second
    assert!(started.elapsed() >= Duration::from_secs(1));

    for hit in &hits {
        assert_eq!(hit.path, "/v1beta/models/gemini-test:generateContent");
        assert_eq!(hit.api_key.as_deref(), Some(KEY));
        assert_eq!(hit.body["tools"], json!([{ "googleSearch": {} }]));
        assert_eq!(hit.body["contents"][0]["role"], "user");
    }
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let stub = Arc::new(Stub {
        statuses: vec![429],
        ..Default::default()
    });
    let client = client_for(serve(stub.clone()).await, 1, None);

    assert!(client.generate(&request()).await.is_ok());
    assert_eq!(hits(&stub).len(), 2);
}

#[tokio::test]
async fn test_client_error_fails_without_retry() {
    let stub = Arc::new(Stub {
        statuses: vec![400],
        ..Default::default()
    });
    let client = client_for(serve(stub.clone()).await, 3, None);

    let err = client.generate(&request()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Api { status: 400, .. }), "{err}");
    assert_eq!(hits(&stub).len(), 1);
}

#[tokio::test]
async fn test_gives_up_after_max_retries() {
    let stub = Arc::new(Stub {
        statuses: vec![500, 502, 503],
        ..Default::default()
    });
    let client = client_for(serve(stub.clone()).await, 1, None);

    let err = client.generate(&request()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Api { status: 502, .. }), "{err}");
    assert_eq!(hits(&stub).len(), 2);
}

#[tokio::test]
async fn test_no_retries_by_default() {
    let stub = Arc::new(Stub {
        statuses: vec![503],
        ..Default::default()
    });
    let client = client_for(serve(stub.clone()).await, 0, None);

    assert!(client.generate(&request()).await.is_err());
    assert_eq!(hits(&stub).len(), 1);
}

#[tokio::test]
async fn test_timeout_surfaces_as_transport_error() {
    let stub = Arc::new(Stub {
        delay: Some(Duration::from_secs(3)),
        ..Default::default()
    });
    let client = client_for(serve(stub.clone()).await, 0, Some(1));

    let err = client.generate(&request()).await.unwrap_err();
    match err {
        GatewayError::Transport(e) => assert!(e.is_timeout(), "{e}"),
        other => panic!("expected a transport timeout, got {other}"),
    }
    assert_eq!(hits(&stub).len(), 1);
}

#[tokio::test]
async fn test_unreachable_host_is_retried_then_reported() {
    // Bind and drop to get a port with nothing listening.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = client_for(format!("http://127.0.0.1:{}", port), 1, None);

    let started = Instant::now();
    let err = client.generate(&request()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)), "{err}");
    // the failed connect was retried after one backoff step
    assert!(started.elapsed() >= Duration::from_secs(1));
}
