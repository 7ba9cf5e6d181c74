//! Agent-mediated stages.

use super::Stage;
use crate::agents::Agent;
use crate::context::StageContext;
use crate::contracts::Schema;
use crate::core::{StageKind, StageResult};
use crate::errors::{AgentInvocationError, PostflowError};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Builds an agent instruction from the stage context.
pub type PromptBuilder = dyn Fn(&StageContext<'_>) -> Result<String, PostflowError> + Send + Sync;

/// How an agent's answer becomes the stage result.
#[derive(Debug, Clone)]
pub enum AgentOutput {
    /// Store the reply text under `key`.
    Text {
        /// Result key.
        key: String,
    },
    /// Parse the reply as a JSON object and validate it.
    Structured {
        /// Shape the reply must have.
        schema: Schema,
    },
}

/// A stage that delegates its work to an [`Agent`].
pub struct AgentStage {
    name: String,
    agent: Arc<Agent>,
    prompt: Box<PromptBuilder>,
    output: AgentOutput,
}

impl AgentStage {
    /// A stage that stores the agent's reply text under `key`.
    pub fn text<F>(name: impl Into<String>, agent: Arc<Agent>, key: impl Into<String>, prompt: F) -> Self
    where
        F: Fn(&StageContext<'_>) -> Result<String, PostflowError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            agent,
            prompt: Box::new(prompt),
            output: AgentOutput::Text { key: key.into() },
        }
    }

    /// A stage whose result is the agent's JSON reply, validated against
    /// `schema`.
    pub fn structured<F>(name: impl Into<String>, agent: Arc<Agent>, schema: Schema, prompt: F) -> Self
    where
        F: Fn(&StageContext<'_>) -> Result<String, PostflowError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            agent,
            prompt: Box::new(prompt),
            output: AgentOutput::Structured { schema },
        }
    }

    /// The bound agent.
    #[must_use]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// The output mode.
    #[must_use]
    pub fn output(&self) -> &AgentOutput {
        &self.output
    }

    fn malformed(&self, message: String) -> PostflowError {
        AgentInvocationError::MalformedResponse {
            agent: self.agent.name().to_string(),
            message,
        }
        .into()
    }
}

impl fmt::Debug for AgentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentStage")
            .field("name", &self.name)
            .field("agent", &self.agent.name())
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for AgentStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Agent
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageResult, PostflowError> {
        let instruction = (self.prompt)(ctx)?;
        let response = self.agent.respond(&instruction).await?;
        debug!(
            stage = %self.name,
            agent = %self.agent.name(),
            tool_calls = response.tool_calls.len(),
            "Agent responded"
        );

        let result = match &self.output {
            AgentOutput::Text { key } => StageResult::single(key.clone(), response.text),
            AgentOutput::Structured { schema } => {
                let value = response
                    .structured
                    .ok_or_else(|| self.malformed("expected a JSON object".to_string()))?;
                if !matches!(value, Value::Object(_)) {
                    return Err(self.malformed("expected a JSON object".to_string()));
                }
                let validated = schema
                    .validate(&value)
                    .map_err(|e| self.malformed(e.to_string()))?;
                StageResult::from_value(validated)
            }
        };

        Ok(result
            .with_metadata("agent", self.agent.name())
            .with_metadata("model", self.agent.model_name())
            .with_metadata("tool_calls", response.tool_calls.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{Capabilities, ModelRef};
    use crate::cancellation::CancellationToken;
    use crate::context::{RunContext, RunIdentity, TriggerInput};
    use crate::contracts::FieldSpec;
    use crate::testing::ScriptedModel;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn agent(model: &Arc<ScriptedModel>) -> Arc<Agent> {
        Arc::new(Agent::bind(
            "editor",
            "You edit.",
            ModelRef::new(model.clone(), "m"),
            Capabilities::none(),
        ))
    }

    async fn run_stage(stage: &AgentStage) -> Result<StageResult, PostflowError> {
        let schema = Schema::new("t").field(FieldSpec::string("topic").required());
        let trigger = TriggerInput::validated(&schema, &json!({"topic": "rides"})).unwrap();
        let identity = RunIdentity::new("t");
        let context = RunContext::new();
        let token = CancellationToken::new();
        let ctx = StageContext::new(&identity, stage.name(), 0, &trigger, &context, &token);
        stage.run(&ctx).await
    }

    fn prompt(ctx: &StageContext<'_>) -> Result<String, PostflowError> {
        Ok(format!("Write about {}", ctx.trigger().require_str("topic")?))
    }

    #[tokio::test]
    async fn test_text_output() {
        let model = Arc::new(ScriptedModel::new().reply("A draft"));
        let stage = AgentStage::text("writer", agent(&model), "draft", prompt);

        let result = run_stage(&stage).await.unwrap();

        assert_eq!(stage.kind(), StageKind::Agent);
        assert_eq!(result.get_str("draft"), Some("A draft"));
        assert_eq!(result.metadata("agent"), Some(&json!("editor")));
        assert_eq!(model.requests()[0].messages[1].content, "Write about rides");
    }

    #[tokio::test]
    async fn test_structured_output() {
        let model = Arc::new(ScriptedModel::new().reply(r#"{"title": "Safe rides"}"#));
        let schema = Schema::new("edit")
            .field(FieldSpec::string("title").required())
            .field(FieldSpec::string("cta").with_default("Call us"));
        let stage = AgentStage::structured("editor", agent(&model), schema, prompt);

        let result = run_stage(&stage).await.unwrap();
        assert_eq!(result.get_str("title"), Some("Safe rides"));
        assert_eq!(result.get_str("cta"), Some("Call us"));
    }

    #[tokio::test]
    async fn test_structured_output_rejects_prose() {
        let model = Arc::new(ScriptedModel::new().reply("Here is your article!"));
        let schema = Schema::new("edit").field(FieldSpec::string("title").required());
        let stage = AgentStage::structured("editor", agent(&model), schema, prompt);

        let err = run_stage(&stage).await.unwrap_err();
        assert!(matches!(
            err,
            PostflowError::Agent(AgentInvocationError::MalformedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_structured_output_rejects_missing_field() {
        let model = Arc::new(ScriptedModel::new().reply(r#"{"cta": "x"}"#));
        let schema = Schema::new("edit").field(FieldSpec::string("title").required());
        let stage = AgentStage::structured("editor", agent(&model), schema, prompt);

        let err = run_stage(&stage).await.unwrap_err();
        assert!(err.to_string().contains("title"));
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let model = Arc::new(ScriptedModel::new().fail("timeout"));
        let stage = AgentStage::text("writer", agent(&model), "draft", prompt);
        let err = run_stage(&stage).await.unwrap_err();
        assert_eq!(err.kind(), "agent_invocation");
    }
}
