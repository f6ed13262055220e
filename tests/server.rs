//! End-to-end tests for the JSON HTTP API.
//!
//! The server runs in-process on a free port over a [`Dashboard`] whose model
//! client replays canned responses, so no network access is needed.

use async_trait::async_trait;
use serde_json::{json, Value};
use sitter::config::Config;
use sitter::dashboard::Dashboard;
use sitter::gateway::{GatewayError, GroundingChunk, ModelClient, ModelResponse};
use sitter::ids::SequentialIds;
use sitter::prompt::GenerateRequest;
use sitter::server::run_server_with;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ─── Canned model ───────────────────────────────────────────────────

/// Pops one canned reply per call. An empty queue answers with no text.
struct CannedModel {
    replies: Mutex<VecDeque<Result<ModelResponse, GatewayError>>>,
}

impl CannedModel {
    fn new(replies: Vec<Result<ModelResponse, GatewayError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }
}

#[async_trait]
impl ModelClient for CannedModel {
    fn model_name(&self) -> &str {
        "canned"
    }

    async fn generate(&self, _request: &GenerateRequest) -> Result<ModelResponse, GatewayError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ModelResponse::default()))
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

/// Start a server over `model` with default config and return its base URL.
async fn start(model: CannedModel) -> String {
    start_with(Config::minimal(), model).await
}

async fn start_with(config: Config, model: CannedModel) -> String {
    let port = find_free_port();
    let bind = format!("127.0.0.1:{}", port);
    let dashboard = Arc::new(Dashboard::new(
        config,
        Arc::new(model),
        Arc::new(SequentialIds::new("id")),
    ));

    let bind_clone = bind.clone();
    tokio::spawn(async move {
        run_server_with(dashboard, &bind_clone).await.ok();
    });
    wait_for_server(port).await;

    format!("http://{}", bind)
}

fn docs_folder() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("Acme");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("faq.md"), "# FAQ\n\nRestart the indexer.").unwrap();
    std::fs::write(root.join("team.csv"), "name,role\nMei Lin,Manager\n").unwrap();
    tmp
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_and_empty_summary() {
    let base = start(CannedModel::new(vec![])).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let summary: Value = client
        .get(format!("{}/api/summary", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        summary,
        json!({
            "knowledgeBaseEntries": 0,
            "files": 0,
            "activeRagSources": 1,
            "stakeholders": 0
        })
    );
}

#[tokio::test]
async fn test_knowledge_base_lifecycle() {
    let base = start(CannedModel::new(vec![])).await;
    let client = reqwest::Client::new();
    let docs = docs_folder();

    let resp = client
        .post(format!("{}/api/knowledge-base", base))
        .json(&json!({ "paths": [docs.path().join("Acme")] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let entry: Value = resp.json().await.unwrap();
    assert_eq!(entry["name"], "Acme");
    assert_eq!(entry["fileCount"], 2);
    let id = entry["id"].as_str().unwrap().to_string();

    let files: Value = client
        .get(format!("{}/api/knowledge-base/files?q=FAQ", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let files = files.as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["relativePath"], "Acme/faq.md");

    let resp = client
        .delete(format!("{}/api/knowledge-base/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    // Unknown ids are a silent no-op.
    let resp = client
        .delete(format!("{}/api/knowledge-base/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let entries: Value = client
        .get(format!("{}/api/knowledge-base", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(entries.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_ingest_errors_use_error_contract() {
    let base = start(CannedModel::new(vec![])).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/knowledge-base", base))
        .json(&json!({ "paths": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let resp = client
        .post(format!("{}/api/knowledge-base", base))
        .json(&json!({ "paths": ["/definitely/not/here"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_rag_source_toggle() {
    let base = start(CannedModel::new(vec![])).await;
    let client = reqwest::Client::new();

    let sources: Value = client
        .get(format!("{}/api/rag-sources", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = sources[0]["id"].as_str().unwrap().to_string();
    assert_eq!(sources[0]["active"], true);

    let url = format!("{}/api/rag-sources/{}/toggle", base, id);
    let first: Value = client.post(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(first["active"], false);
    let second: Value = client.post(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(second["active"], true);

    // Unknown ids are a no-op answered with null.
    let resp = client
        .post(format!("{}/api/rag-sources/missing/toggle", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body.is_null());

    let sources: Value = client
        .get(format!("{}/api/rag-sources", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sources[0]["active"], true);
}

#[tokio::test]
async fn test_query_and_last_result() {
    let base = start(CannedModel::new(vec![
        Ok(ModelResponse {
            text: Some(r#"{"answerEnglish":"Restart the indexer.","answerChinese":"重新啟動索引器。"}"#.to_string()),
            grounding: vec![GroundingChunk {
                title: Some("Indexing".to_string()),
                uri: Some("https://experienceleague.adobe.com/indexing".to_string()),
            }],
        }),
        Err(GatewayError::MissingApiKey("API_KEY".to_string())),
    ]))
    .await;
    let client = reqwest::Client::new();

    let last: Value = client
        .get(format!("{}/api/query/last", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(last.is_null());

    let resp = client
        .post(format!("{}/api/query", base))
        .json(&json!({ "country": "Taiwan", "question": "Search is stale" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let answer: Value = resp.json().await.unwrap();
    assert_eq!(answer["answerEnglish"], "Restart the indexer.");
    assert_eq!(answer["groundingUrls"][0]["title"], "Indexing");

    // A failed call surfaces as 502 and keeps the previous answer.
    let resp = client
        .post(format!("{}/api/query", base))
        .json(&json!({ "country": "Taiwan", "question": "Again" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "agent_unreachable");

    let last: Value = client
        .get(format!("{}/api/query/last", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(last, answer);

    let resp = client
        .post(format!("{}/api/query", base))
        .json(&json!({ "country": "", "question": "Anything" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_stakeholder_workflow() {
    let base = start(CannedModel::new(vec![Ok(ModelResponse::text(
        "```json\n[{\"name\":\"Mei Lin\",\"region\":\"Taiwan\",\"role\":\"Manager\",\"roleChinese\":\"經理\",\"source\":\"File: Acme/team.csv\"}]\n```",
    ))]))
    .await;
    let client = reqwest::Client::new();

    let generated: Value = client
        .post(format!("{}/api/stakeholders/generate", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let generated = generated.as_array().unwrap();
    assert_eq!(generated.len(), 1);
    assert_eq!(generated[0]["name"], "Mei Lin");
    assert_eq!(generated[0]["role"], "Manager / 經理");
    assert_eq!(generated[0]["department"], "Unknown");

    let resp = client
        .post(format!("{}/api/stakeholders", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let manual: Value = resp.json().await.unwrap();
    assert_eq!(manual["source"], "Manual Entry");
    let manual_id = manual["id"].as_str().unwrap().to_string();

    let updated: Value = client
        .patch(format!("{}/api/stakeholders/{}", base, manual_id))
        .json(&json!({ "name": "Kenji Sato", "region": "Japan" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["name"], "Kenji Sato");
    assert_eq!(updated["role"], manual["role"]);

    let resp = client
        .patch(format!("{}/api/stakeholders/missing", base))
        .json(&json!({ "name": "Nobody" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body.is_null());

    let resp = client
        .get(format!("{}/api/stakeholders/export.csv", base))
        .send()
        .await
        .unwrap();
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    let csv = resp.text().await.unwrap();
    let rows: Vec<&str> = csv.split("\r\n").filter(|r| !r.is_empty()).collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[2].starts_with("Kenji Sato,Japan,"));

    let resp = client
        .delete(format!("{}/api/stakeholders/{}", base, manual_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let all: Value = client
        .get(format!("{}/api/stakeholders", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.as_array().unwrap().len(), 1);
}

// ─── CORS ───────────────────────────────────────────────────────────

async fn preflight(client: &reqwest::Client, base: &str, origin: &str) -> reqwest::Response {
    client
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/api/knowledge-base", base),
        )
        .header("Origin", origin)
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_cross_origin_ingest_is_not_allowed_by_default() {
    let base = start(CannedModel::new(vec![])).await;
    let client = reqwest::Client::new();

    let resp = preflight(&client, &base, "https://evil.example").await;
    assert!(resp
        .headers()
        .get("access-control-allow-origin")
        .is_none());

    let docs = docs_folder();
    let resp = client
        .post(format!("{}/api/knowledge-base", base))
        .header("Origin", "https://evil.example")
        .json(&json!({ "paths": [docs.path().join("Acme")] }))
        .send()
        .await
        .unwrap();
    assert!(resp
        .headers()
        .get("access-control-allow-origin")
        .is_none());
}

#[tokio::test]
async fn test_configured_origin_is_allowed() {
    let mut config = Config::minimal();
    config.server.cors_origins = vec!["http://localhost:5173".to_string()];
    let base = start_with(config, CannedModel::new(vec![])).await;
    let client = reqwest::Client::new();

    let resp = preflight(&client, &base, "http://localhost:5173").await;
    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers()["access-control-allow-origin"],
        "http://localhost:5173"
    );

    let resp = preflight(&client, &base, "https://evil.example").await;
    assert!(resp
        .headers()
        .get("access-control-allow-origin")
        .is_none());

    let resp = client
        .get(format!("{}/api/summary", base))
        .header("Origin", "http://localhost:5173")
        .send()
        .await
        .unwrap();
    assert_eq!(
        resp.headers()["access-control-allow-origin"],
        "http://localhost:5173"
    );
}
