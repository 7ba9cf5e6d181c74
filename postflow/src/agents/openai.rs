//! OpenAI-compatible chat completions client.

use super::model::{ChatMessage, ChatRequest, ChatResponse, LanguageModel, Role, ToolCall};
use crate::config::{require_secret, LlmSettings};
use crate::errors::ConfigError;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// A [`LanguageModel`] speaking the `/chat/completions` protocol.
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    http: Client,
    base_url: String,
    api_key: String,
    user_agent: String,
}

impl OpenAiChatModel {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Missing`] when no API key is configured.
    pub fn new(settings: &LlmSettings) -> Result<Self, ConfigError> {
        let api_key = require_secret(&settings.api_key, "OPENAI_API_KEY")?.to_string();
        let http = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| ConfigError::Invalid {
                key: "http_client".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            user_agent: format!("postflow/{}", env!("CARGO_PKG_VERSION")),
        })
    }
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: Role,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: Some(message.content.clone()),
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    kind: function_type(),
                    function: WireFunction {
                        name: call.name.clone(),
                        arguments: Value::String(call.arguments.to_string()),
                    },
                })
                .collect(),
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

/// Parses tool-call arguments sent either as a JSON string or an object.
fn parse_arguments(raw: Value) -> Result<Value> {
    match raw {
        Value::String(s) if s.trim().is_empty() => Ok(json!({})),
        Value::String(s) => serde_json::from_str(&s).context("Invalid JSON in tool call arguments"),
        Value::Object(map) => Ok(Value::Object(map)),
        _ => Ok(json!({})),
    }
}

fn into_response(wire: WireResponse) -> Result<ChatResponse> {
    let choice = wire
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Response contained no choices"))?;
    let tool_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|call| {
            Ok(ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: parse_arguments(call.function.arguments)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ChatResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
        finish_reason: choice.finish_reason,
    })
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = WireRequest {
            model: &request.model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            tools: request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("User-Agent", &self.user_agent)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to chat completions endpoint")?;

        match response.status() {
            StatusCode::OK => {
                let wire: WireResponse = response
                    .json()
                    .await
                    .context("Failed to parse chat completion response JSON")?;
                let parsed = into_response(wire)?;
                debug!(
                    model = %request.model,
                    tool_calls = parsed.tool_calls.len(),
                    "Chat completion finished"
                );
                Ok(parsed)
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let error_text = response.text().await.unwrap_or_default();
                Err(anyhow!("Rate limit or quota exceeded (API response: {error_text})"))
            }
            StatusCode::UNAUTHORIZED => Err(anyhow!("Invalid API key. Please check the model provider key.")),
            StatusCode::BAD_REQUEST => {
                let error_text = response.text().await.unwrap_or_default();
                Err(anyhow!("Invalid request: {error_text}"))
            }
            StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE => {
                Err(anyhow!("Model provider is temporarily unavailable."))
            }
            status => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(anyhow!("API error (status {status}): {error_text}"))
            }
        }
    }
}
