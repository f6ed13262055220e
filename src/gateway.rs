//! Agent gateway: sends assembled requests to the generative model.
//!
//! Defines the [`ModelClient`] trait and [`GeminiClient`], the default
//! implementation over the `generateContent` REST endpoint, plus the two
//! agent operations built on top of any client:
//!
//! - [`answer_query`]: bilingual support answer with grounding citations.
//!   Transport and shape failures propagate to the caller.
//! - [`extract_stakeholders`]: best effort; every failure yields `[]`.
//!
//! # Response handling
//!
//! The model is asked for JSON, but sometimes wraps it in Markdown fences.
//! [`parse_json_payload`] parses the raw text first and, on failure, strips
//! ```` ```json ```` / ```` ``` ```` markers and tries exactly once more.
//! Missing fields are then filled from [`crate::fallbacks`].
//!
//! # Retry Strategy
//!
//! Off by default (`agent.max_retries = 0`). When enabled:
//! - HTTP 429 and 5xx → retry
//! - other HTTP 4xx → fail immediately
//! - network errors → retry
//! - backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::config::AgentConfig;
use crate::fallbacks::{self, or_fallback};
use crate::models::{AgentResult, ExtractedStakeholder, GroundingUrl};
use crate::prompt::{GenerateRequest, Part};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0} environment variable not set")]
    MissingApiKey(String),

    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("model response is not valid JSON: {0}")]
    Shape(String),
}

/// One web reference from the model's grounding metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundingChunk {
    pub title: Option<String>,
    pub uri: Option<String>,
}

/// Raw model output before parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelResponse {
    /// Text intended to be JSON. `None` when the model produced no text.
    pub text: Option<String>,
    pub grounding: Vec<GroundingChunk>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            grounding: Vec::new(),
        }
    }
}

/// A remote generative model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    async fn generate(&self, request: &GenerateRequest) -> Result<ModelResponse, GatewayError>;
}

// ============ Agent operations ============

/// Answer a support question.
pub async fn answer_query(
    client: &dyn ModelClient,
    request: &GenerateRequest,
) -> Result<AgentResult, GatewayError> {
    tracing::debug!(model = client.model_name(), parts = request.parts.len(), "answer query");
    let response = client.generate(request).await?;
    let payload = parse_json_payload(response.text.as_deref().unwrap_or("{}"))?;
    Ok(normalize_answer(&payload, &response.grounding))
}

/// Extract stakeholders from the attached documents.
///
/// Never fails: transport and parse failures are logged and yield `[]`.
pub async fn extract_stakeholders(
    client: &dyn ModelClient,
    request: &GenerateRequest,
) -> Vec<ExtractedStakeholder> {
    tracing::debug!(model = client.model_name(), parts = request.parts.len(), "extract stakeholders");
    let response = match client.generate(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("stakeholder extraction failed: {}", e);
            return Vec::new();
        }
    };

    match parse_json_payload(response.text.as_deref().unwrap_or("[]")) {
        Ok(payload) => normalize_extraction(payload),
        Err(e) => {
            tracing::warn!("stakeholder extraction returned unusable output: {}", e);
            Vec::new()
        }
    }
}

/// Parse model text as JSON, retrying once with Markdown fences removed.
pub fn parse_json_payload(text: &str) -> Result<Value, GatewayError> {
    match serde_json::from_str(text.trim()) {
        Ok(value) => Ok(value),
        Err(_) => serde_json::from_str(&strip_code_fences(text))
            .map_err(|e| GatewayError::Shape(e.to_string())),
    }
}

/// Remove every ```` ```json ```` and ```` ``` ```` marker and trim.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Build an [`AgentResult`] from parsed JSON, filling missing answers and
/// keeping only grounding references with a URI.
pub fn normalize_answer(payload: &Value, grounding: &[GroundingChunk]) -> AgentResult {
    let field = |name: &str| payload.get(name).and_then(Value::as_str);

    let grounding_urls = grounding
        .iter()
        .filter_map(|chunk| {
            let uri = chunk.uri.as_deref().filter(|u| !u.is_empty())?;
            Some(GroundingUrl {
                title: or_fallback(chunk.title.as_deref(), fallbacks::GROUNDING_TITLE),
                uri: uri.to_string(),
            })
        })
        .collect();

    AgentResult {
        answer_english: or_fallback(field("answerEnglish"), fallbacks::ANSWER_ENGLISH),
        answer_chinese: or_fallback(field("answerChinese"), fallbacks::ANSWER_CHINESE),
        grounding_urls,
    }
}

/// Read extraction items from parsed JSON. Non-arrays give `[]`; items that
/// are not stakeholder-shaped objects are skipped.
pub fn normalize_extraction(payload: Value) -> Vec<ExtractedStakeholder> {
    let Value::Array(items) = payload else {
        tracing::warn!("stakeholder extraction did not return an array");
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(stakeholder) => Some(stakeholder),
            Err(e) => {
                tracing::debug!("skipping malformed stakeholder item: {}", e);
                None
            }
        })
        .collect()
}

// ============ Gemini client ============

/// Client for the Gemini `generateContent` REST API.
///
/// The API key is read from `agent.api_key_env` on every call, so a key
/// exported after startup is picked up and a missing key fails each call.
pub struct GeminiClient {
    config: AgentConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: &AgentConfig) -> Result<Self, GatewayError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            config: config.clone(),
            http: builder.build()?,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<ModelResponse, GatewayError> {
        let api_key = std::env::var(&self.config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GatewayError::MissingApiKey(self.config.api_key_env.clone()))?;

        let body = request_body(request);
        let url = self.endpoint();
        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(attempt, ?delay, "retrying model request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(&url)
                .header("x-goog-api-key", &api_key)
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: Value = response.json().await?;
                        return Ok(parse_generate_response(&json));
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = GatewayError::Api {
                        status: status.as_u16(),
                        body: body_text,
                    };

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(err);
                        continue;
                    }

                    return Err(err);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| GatewayError::Shape("no response from model".to_string())))
    }
}

/// Serialize a [`GenerateRequest`] as a `generateContent` body.
pub fn request_body(request: &GenerateRequest) -> Value {
    let parts: Vec<Value> = request
        .parts
        .iter()
        .map(|part| match part {
            Part::Text(text) => json!({ "text": text }),
            Part::InlineData { mime_type, data } => json!({
                "inlineData": { "mimeType": mime_type, "data": data }
            }),
        })
        .collect();

    let mut body = json!({
        "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": request.response_schema,
        },
    });

    if request.search_grounding {
        body["tools"] = json!([{ "googleSearch": {} }]);
    }

    body
}

/// Pull response text and grounding chunks out of a `generateContent` reply.
pub fn parse_generate_response(json: &Value) -> ModelResponse {
    let candidate = json.get("candidates").and_then(|c| c.get(0));

    let text: Option<String> = candidate
        .and_then(|c| c.pointer("/content/parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .filter(|t| !t.is_empty());

    let grounding = candidate
        .and_then(|c| c.pointer("/groundingMetadata/groundingChunks"))
        .and_then(Value::as_array)
        .map(|chunks| {
            chunks
                .iter()
                .filter_map(|chunk| chunk.get("web"))
                .map(|web| GroundingChunk {
                    title: web.get("title").and_then(Value::as_str).map(str::to_string),
                    uri: web.get("uri").and_then(Value::as_str).map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default();

    ModelResponse { text, grounding }
}
