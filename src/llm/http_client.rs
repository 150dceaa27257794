//! HTTP client for an OpenAI-compatible chat-completions backend
//!
//! Endpoints:
//! - `POST {api_base}/chat/completions`
//! - `POST {api_base}/guardrails/{id}/apply` (only when a guardrail id is set)

use super::{GuardrailMode, GuardrailVerdict, GuardrailViolation, LanguageBackend, ViolationKind};
use crate::config::LlmConfig;
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Request body, OpenAI-compatible
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub max_tokens: i32,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// "system", "user" or "assistant"
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: Message,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl ChatResponse {
    /// Text of the first choice
    pub fn text(&self) -> Result<&str, LlmError> {
        self.choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| LlmError::Parse("response contained no choices".to_string()))
    }
}

pub struct HttpLanguageBackend {
    http_client: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    guardrail_id: Option<String>,
}

impl HttpLanguageBackend {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;

        Ok(Self {
            http_client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            guardrail_id: config.guardrail_id.clone(),
        })
    }

    pub fn chat_endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    pub fn guardrail_endpoint(&self, guardrail_id: &str) -> String {
        format!("{}/guardrails/{}/apply", self.api_base, guardrail_id)
    }

    pub fn build_request(&self, system: &str, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            max_tokens: 4096,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: Some(0.0),
        }
    }

    async fn post_json<B: Serialize>(&self, url: &str, body: &B) -> Result<String, LlmError> {
        let mut request = self
            .http_client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| LlmError::Http(e.to_string()))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| LlmError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

/// Read a guardrail response (`action`, `outputs`, `assessments`)
///
/// Blocked when `action` is `GUARDRAIL_INTERVENED`. Violations are collected
/// from topic, content filter and sensitive-information assessments.
pub fn parse_guardrail_response(body: &Value) -> GuardrailVerdict {
    let intervened = body.get("action").and_then(Value::as_str) == Some("GUARDRAIL_INTERVENED");
    if !intervened {
        return GuardrailVerdict::allow();
    }

    let mut violations = Vec::new();
    let assessments = body.get("assessments").and_then(Value::as_array).cloned().unwrap_or_default();
    for assessment in &assessments {
        let sources = [
            ("/topicPolicy/topics", "name", ViolationKind::Topic),
            ("/contentPolicy/filters", "type", ViolationKind::Content),
            ("/sensitiveInformationPolicy/piiEntities", "type", ViolationKind::SensitiveInformation),
        ];
        for (pointer, key, kind) in sources {
            let entries = assessment.pointer(pointer).and_then(Value::as_array);
            for entry in entries.into_iter().flatten() {
                if let Some(name) = entry.get(key).and_then(Value::as_str) {
                    violations.push(GuardrailViolation {
                        kind,
                        name: name.to_string(),
                    });
                }
            }
        }
    }

    let output = body
        .pointer("/outputs/0/text")
        .and_then(Value::as_str)
        .map(str::to_string);

    GuardrailVerdict {
        allowed: false,
        violations,
        output,
    }
}

#[async_trait]
impl LanguageBackend for HttpLanguageBackend {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let request = self.build_request(system, prompt);
        let text = self.post_json(&self.chat_endpoint(), &request).await?;
        let response: ChatResponse = serde_json::from_str(&text).map_err(|e| LlmError::Parse(e.to_string()))?;
        response.text().map(str::to_string)
    }

    async fn apply_guardrail(&self, text: &str, mode: GuardrailMode) -> Result<GuardrailVerdict, LlmError> {
        let Some(guardrail_id) = &self.guardrail_id else {
            return Ok(GuardrailVerdict::allow());
        };

        let body = json!({
            "source": mode,
            "content": [{"text": {"text": text}}]
        });
        let raw = self.post_json(&self.guardrail_endpoint(guardrail_id), &body).await?;
        let parsed: Value = serde_json::from_str(&raw).map_err(|e| LlmError::Parse(e.to_string()))?;
        Ok(parse_guardrail_response(&parsed))
    }
}
