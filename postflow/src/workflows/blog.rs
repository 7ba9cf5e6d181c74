//! The three-stage blog workflow: plan, write, edit.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;

use crate::agents::{personas, Agent, Capabilities, ModelRef};
use crate::context::StageContext;
use crate::contracts::{FieldSpec, FieldType, Schema};
use crate::errors::{PipelineDefinitionError, PostflowError};
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::stages::{AgentStage, Stage};

/// Pipeline name.
pub const BLOG_PIPELINE: &str = "escort-blog";
/// Outline stage.
pub const PLANNING_STAGE: &str = "content_planning";
/// Draft stage.
pub const WRITING_STAGE: &str = "blog_writing";
/// Editing stage; its result is the article record.
pub const EDITING_STAGE: &str = "editing";

/// Feature emphasised when the trigger names none.
pub const DEFAULT_SERVICE_FEATURE: &str = "safety and learning support";

/// Trigger schema of the blog workflow.
#[must_use]
pub fn trigger_schema() -> Schema {
    Schema::new("blog_trigger")
        .field(
            FieldSpec::string("topic")
                .required()
                .with_min_length(1)
                .with_description("Blog topic related to the escort service"),
        )
        .field(FieldSpec::string("targetAudience").with_description("Age group or reader the post is for"))
        .field(
            FieldSpec::string("serviceFeature")
                .with_default(DEFAULT_SERVICE_FEATURE)
                .with_description("Service feature to emphasise"),
        )
}

/// Shape of the editor's answer.
#[must_use]
pub fn article_schema() -> Schema {
    Schema::new("edited_article")
        .field(FieldSpec::string("title").required().with_min_length(1))
        .field(FieldSpec::string("meta_description").required())
        .field(FieldSpec::array("keywords", FieldType::String).with_default(serde_json::json!([])))
        .field(FieldSpec::string("category").with_default("Blog"))
        .field(FieldSpec::string("cta").required())
        .field(FieldSpec::string("body_markdown").required().with_min_length(1))
}

/// The edited article, as committed by [`EDITING_STAGE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditedArticle {
    /// Headline.
    pub title: String,
    /// SEO meta description.
    pub meta_description: String,
    /// SEO keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Suggested category name.
    #[serde(default)]
    pub category: String,
    /// Call to action.
    pub cta: String,
    /// Article body.
    pub body_markdown: String,
}

/// The agents the blog workflow binds.
#[derive(Debug, Clone)]
pub struct BlogAgents {
    /// Plans the outline.
    pub planner: Arc<Agent>,
    /// Writes the draft.
    pub writer: Arc<Agent>,
    /// Edits and structures the final article.
    pub editor: Arc<Agent>,
}

impl BlogAgents {
    /// Binds the three agents to one model. Only the planner may research.
    #[must_use]
    pub fn bind(model: &ModelRef, research: Capabilities) -> Self {
        Self {
            planner: Arc::new(Agent::bind("content_planner", personas::CONTENT_PLANNER, model.clone(), research)),
            writer: Arc::new(Agent::bind("blog_writer", personas::BLOG_WRITER, model.clone(), Capabilities::none())),
            editor: Arc::new(Agent::bind("editor", personas::EDITOR, model.clone(), Capabilities::none())),
        }
    }
}

fn planning_prompt(ctx: &StageContext<'_>) -> Result<String, PostflowError> {
    let trigger = ctx.trigger();
    let topic = trigger.require_str("topic")?;
    let feature = trigger.get_str("serviceFeature").unwrap_or(DEFAULT_SERVICE_FEATURE);

    let mut prompt = format!(
        "Create the outline of a blog post about \"{topic}\" for our children's escort service.\n\
         Service feature to emphasise: {feature}\n"
    );
    if let Some(audience) = trigger.get_str("targetAudience") {
        let _ = writeln!(prompt, "Target audience: {audience}");
    }
    prompt.push_str(
        "\nInclude:\n\
         1. An engaging H1 headline\n\
         2. A lead paragraph that draws the reader in\n\
         3. Four to six H2 sections\n\
         4. The key points each section covers\n\
         5. The worries readers have and how the service answers them\n\
         6. A call to action inviting enquiries",
    );
    Ok(prompt)
}

fn writing_prompt(ctx: &StageContext<'_>) -> Result<String, PostflowError> {
    let topic = ctx.trigger().require_str("topic")?;
    let plan = ctx.inputs().require_str(PLANNING_STAGE, "content_plan")?;
    Ok(format!(
        "Write the complete blog post following this outline.\n\n\
         Topic: {topic}\n\n\
         Outline:\n{plan}\n\n\
         Answer in Markdown."
    ))
}

fn editing_prompt(ctx: &StageContext<'_>) -> Result<String, PostflowError> {
    let draft = ctx.inputs().require_str(WRITING_STAGE, "draft")?;
    Ok(format!(
        "Edit and optimise this blog post: check meta description and keyword placement, \
         tighten the prose, strengthen the call to action and keep the style consistent.\n\n\
         Original post:\n{draft}"
    ))
}

/// The workflow's stages, in order.
#[must_use]
pub fn stages(agents: &BlogAgents) -> Vec<Arc<dyn Stage>> {
    vec![
        Arc::new(AgentStage::text(PLANNING_STAGE, agents.planner.clone(), "content_plan", planning_prompt)),
        Arc::new(AgentStage::text(WRITING_STAGE, agents.writer.clone(), "draft", writing_prompt)),
        Arc::new(AgentStage::structured(
            EDITING_STAGE,
            agents.editor.clone(),
            article_schema(),
            editing_prompt,
        )),
    ]
}

/// A builder preloaded with the blog stages, for callers that append more
/// stages or attach an event sink.
#[must_use]
pub fn builder(agents: &BlogAgents) -> PipelineBuilder {
    stages(agents)
        .into_iter()
        .fold(PipelineBuilder::new(BLOG_PIPELINE).input_schema(trigger_schema()), PipelineBuilder::stage)
}

/// Builds the blog pipeline.
pub fn pipeline(agents: &BlogAgents) -> Result<Pipeline, PipelineDefinitionError> {
    builder(agents).build()
}
