//! Agent binding and the respond loop.

use super::capabilities::{Capabilities, ToolInvocation};
use super::model::{ChatMessage, ChatRequest, LanguageModel};
use crate::config::LlmSettings;
use crate::errors::AgentInvocationError;
use crate::utils::strip_code_fence;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Default number of tool rounds before an agent gives up.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 4;

/// Which model an agent uses, and how.
#[derive(Debug, Clone)]
pub struct ModelRef {
    /// The provider client.
    pub client: Arc<dyn LanguageModel>,
    /// Model name sent with each request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Completion token limit.
    pub max_tokens: Option<u32>,
}

impl ModelRef {
    /// References `model` on `client`.
    #[must_use]
    pub fn new(client: Arc<dyn LanguageModel>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// References the configured default model on `client`.
    #[must_use]
    pub fn from_settings(client: Arc<dyn LanguageModel>, settings: &LlmSettings) -> Self {
        Self {
            client,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: Some(settings.max_tokens),
        }
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the token limit.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// An agent's final answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// The reply text.
    pub text: String,
    /// The reply parsed as JSON, if it is JSON (fenced or bare).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<Value>,
    /// Tool calls made along the way, in order.
    #[serde(default)]
    pub tool_calls: Vec<ToolInvocation>,
}

/// A persona bound to a model and a set of permitted adapters.
#[derive(Debug, Clone)]
pub struct Agent {
    name: String,
    persona: String,
    model: ModelRef,
    capabilities: Capabilities,
    max_tool_rounds: usize,
}

impl Agent {
    /// Binds an agent.
    #[must_use]
    pub fn bind(
        name: impl Into<String>,
        persona: impl Into<String>,
        model: ModelRef,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            name: name.into(),
            persona: persona.into(),
            model,
            capabilities,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Sets how many tool rounds a single response may take.
    #[must_use]
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// The agent name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The persona instructions.
    #[must_use]
    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// The model name.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model.model
    }

    /// The permitted adapters.
    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Sends `instruction` to the model and returns its final answer.
    ///
    /// Tool calls requested by the model are executed against the permitted
    /// adapters and fed back until the model answers with text.
    ///
    /// # Errors
    ///
    /// [`AgentInvocationError::Model`] when the provider call fails,
    /// [`AgentInvocationError::MalformedResponse`] for an empty answer,
    /// [`AgentInvocationError::ToolRoundsExceeded`] when the model keeps
    /// calling tools.
    #[instrument(skip(self, instruction), fields(agent = %self.name, model = %self.model.model))]
    pub async fn respond(&self, instruction: &str) -> Result<AgentResponse, AgentInvocationError> {
        let mut messages = vec![ChatMessage::system(&self.persona), ChatMessage::user(instruction)];
        let tools = self.capabilities.tools();
        let mut invocations = Vec::new();

        for round in 0..=self.max_tool_rounds {
            let request = ChatRequest {
                model: self.model.model.clone(),
                messages: messages.clone(),
                tools: tools.clone(),
                temperature: self.model.temperature,
                max_tokens: self.model.max_tokens,
            };
            let reply = self
                .model
                .client
                .complete(&request)
                .await
                .map_err(|e| AgentInvocationError::Model {
                    agent: self.name.clone(),
                    message: format!("{e:#}"),
                })?;

            if reply.tool_calls.is_empty() {
                if reply.content.trim().is_empty() {
                    return Err(AgentInvocationError::MalformedResponse {
                        agent: self.name.clone(),
                        message: "model returned an empty answer".to_string(),
                    });
                }
                let structured = serde_json::from_str(strip_code_fence(&reply.content)).ok();
                debug!(round, tool_calls = invocations.len(), "Agent answered");
                return Ok(AgentResponse {
                    text: reply.content,
                    structured,
                    tool_calls: invocations,
                });
            }

            if round == self.max_tool_rounds {
                break;
            }

            debug!(round, calls = reply.tool_calls.len(), "Model requested tools");
            messages.push(ChatMessage::assistant(reply.content, reply.tool_calls.clone()));
            for call in &reply.tool_calls {
                let invocation = self.capabilities.dispatch(call).await;
                messages.push(ChatMessage::tool(&call.id, invocation.to_message_content()));
                invocations.push(invocation);
            }
        }

        Err(AgentInvocationError::ToolRoundsExceeded {
            agent: self.name.clone(),
            limit: self.max_tool_rounds,
        })
    }

    /// Like [`respond`](Self::respond), then deserializes the answer as JSON.
    ///
    /// A fenced ```` ```json ```` block is accepted.
    ///
    /// # Errors
    ///
    /// As [`respond`](Self::respond), plus
    /// [`AgentInvocationError::MalformedResponse`] when the answer does not
    /// deserialize into `T`.
    pub async fn respond_json<T: DeserializeOwned>(&self, instruction: &str) -> Result<T, AgentInvocationError> {
        let response = self.respond(instruction).await?;
        serde_json::from_str(strip_code_fence(&response.text)).map_err(|e| {
            AgentInvocationError::MalformedResponse {
                agent: self.name.clone(),
                message: format!("expected JSON: {e}"),
            }
        })
    }
}
