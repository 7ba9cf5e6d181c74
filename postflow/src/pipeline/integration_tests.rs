//! End-to-end runs over real stages, fakes and scripted models.

use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use super::{PipelineBuilder, RunOptions};
use crate::adapters::{Category, ContentStore, InMemoryContentStore};
use crate::agents::{Capabilities, ModelRef};
use crate::cancellation::CancellationToken;
use crate::config::Settings;
use crate::core::RunState;
use crate::events::CollectingEventSink;
use crate::testing::{
    CancellingStage, FailingStage, InMemoryPublisher, RecordingStage, ScriptedModel, SuccessStage,
};
use crate::workflows::blog::{self, BlogAgents, EditedArticle};
use crate::workflows::publish;

const EDITED_JSON: &str = r##"```json
{
  "title": "Safe School Pickups",
  "meta_description": "How our escorts get children home safely every day.",
  "keywords": ["school pickup", "child safety"],
  "cta": "Book a free trial ride",
  "body_markdown": "# Safe School Pickups\n\nEvery afternoon..."
}
```"##;

fn scripted_blog_run(model: ScriptedModel) -> ScriptedModel {
    model
        .reply("# Outline\n1. Why pickups matter\n2. How we check in")
        .reply("# Safe School Pickups\n\nSchool pickups, done right. Draft body.")
        .reply(EDITED_JSON)
}

fn blog_model() -> Arc<ScriptedModel> {
    Arc::new(scripted_blog_run(ScriptedModel::new()))
}

fn agents(model: &Arc<ScriptedModel>) -> BlogAgents {
    BlogAgents::bind(&ModelRef::new(model.clone(), "test-model"), Capabilities::none())
}

#[tokio::test]
async fn test_stages_run_in_declared_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let stages: Vec<Arc<RecordingStage>> = ["plan", "write", "edit", "publish"]
        .iter()
        .map(|name| Arc::new(RecordingStage::with_log(*name, log.clone())))
        .collect();
    let pipeline = stages
        .iter()
        .fold(PipelineBuilder::new("ordered"), |builder, stage| builder.stage(stage.clone()))
        .build()
        .unwrap();

    let run = pipeline.execute(&json!({})).await;

    assert!(run.is_completed());
    assert_eq!(*log.lock(), vec!["plan", "write", "edit", "publish"]);
    assert_eq!(run.context.stage_names(), vec!["plan", "write", "edit", "publish"]);

    let edit = stages[2].executions();
    assert_eq!(edit.len(), 1);
    assert_eq!(edit[0].stage_index, 2);
    assert_eq!(edit[0].visible_stages, vec!["plan", "write"]);
}

#[tokio::test]
async fn test_invalid_trigger_runs_no_stage() {
    let stage = Arc::new(RecordingStage::new("plan"));
    let pipeline = blog::builder(&agents(&blog_model()))
        .stage(stage.clone())
        .build()
        .unwrap();

    let run = pipeline.execute(&json!({"topic": ""})).await;

    assert!(run.is_failed());
    assert_eq!(run.error().and_then(|e| e.as_validation()).unwrap().field, "topic");
    assert_eq!(run.failed_stage(), None);
    assert!(run.trigger.is_none());
    assert!(run.context.is_empty());
    assert_eq!(stage.execution_count(), 0);
}

#[tokio::test]
async fn test_failure_stops_later_stages() {
    let after = Arc::new(RecordingStage::new("after"));
    let pipeline = PipelineBuilder::new("halting")
        .stage(Arc::new(SuccessStage::new("first")))
        .stage(Arc::new(FailingStage::new("second", "boom")))
        .stage(after.clone())
        .build()
        .unwrap();

    let run = pipeline.execute(&json!({})).await;

    assert!(run.is_failed());
    assert_eq!(run.failed_stage(), Some("second"));
    assert!(matches!(run.state, RunState::Failed { stage_index: 1, .. }));
    assert_eq!(run.context.stage_names(), vec!["first"]);
    assert_eq!(after.execution_count(), 0);
    assert!(run.into_result().is_err());
}

#[tokio::test]
async fn test_cancellation_between_stages() {
    let token = CancellationToken::new();
    let last = Arc::new(RecordingStage::new("last"));
    let pipeline = PipelineBuilder::new("cancellable")
        .stage(Arc::new(SuccessStage::new("first")))
        .stage(Arc::new(CancellingStage::new("second", token.clone(), "operator stop")))
        .stage(last.clone())
        .build()
        .unwrap();

    let run = pipeline
        .execute_with(&json!({}), RunOptions::new().with_cancel(token))
        .await;

    assert!(run.is_cancelled());
    assert!(matches!(
        &run.state,
        RunState::Cancelled { stage_index: 2, reason } if reason == "operator stop"
    ));
    assert_eq!(run.context.stage_names(), vec!["first", "second"]);
    assert_eq!(run.final_value("second", "cancel_seen"), Some(&json!(true)));
    assert_eq!(last.execution_count(), 0);
}

#[tokio::test]
async fn test_blog_workflow_end_to_end() {
    let model = blog_model();
    let sink = Arc::new(CollectingEventSink::new());
    let pipeline = blog::builder(&agents(&model)).with_event_sink(sink.clone()).build().unwrap();

    let run = pipeline
        .execute(&json!({"topic": "School pickups", "targetAudience": "working parents"}))
        .await;

    assert!(run.is_completed(), "{:?}", run.error());
    assert_eq!(
        run.context.stage_names(),
        vec![blog::PLANNING_STAGE, blog::WRITING_STAGE, blog::EDITING_STAGE]
    );
    assert_eq!(model.remaining(), 0);

    let requests = model.requests();
    assert!(requests[1].messages[1].content.contains("Topic: School pickups"));
    assert!(requests[1].messages[1].content.contains("Why pickups matter"));
    assert!(requests[2].messages[1].content.contains("Draft body."));

    let draft = run
        .final_value(blog::WRITING_STAGE, "draft")
        .and_then(Value::as_str)
        .unwrap();
    assert!(!draft.trim().is_empty());
    assert!(draft.contains("School pickups"));

    let article: EditedArticle = run.result(blog::EDITING_STAGE).unwrap().parse().unwrap();
    assert_eq!(article.meta_description, "How our escorts get children home safely every day.");
    assert_eq!(article.category, "Blog");

    let names: Vec<String> = sink.events().into_iter().map(|e| e.event_type).collect();
    assert_eq!(names.first().map(String::as_str), Some("pipeline.started"));
    assert_eq!(names.last().map(String::as_str), Some("pipeline.completed"));
}

#[tokio::test]
async fn test_blog_workflow_rejects_empty_trigger() {
    let model = blog_model();
    let run = blog::pipeline(&agents(&model)).unwrap().execute(&json!({})).await;

    assert_eq!(run.error().and_then(|e| e.as_validation()).unwrap().field, "topic");
    assert!(model.requests().is_empty());
}

#[tokio::test]
async fn test_malformed_editor_answer_fails_editing() {
    let model = Arc::new(
        ScriptedModel::new()
            .reply("outline")
            .reply("draft")
            .reply("Here is your edited article, hope you like it!"),
    );
    let run = blog::pipeline(&agents(&model))
        .unwrap()
        .execute(&json!({"topic": "Rainy days"}))
        .await;

    assert_eq!(run.failed_stage(), Some(blog::EDITING_STAGE));
    assert_eq!(run.error().map(|e| e.kind()), Some("agent_invocation"));
    assert_eq!(run.context.len(), 2);
}

#[tokio::test]
async fn test_publish_workflow_saves_and_publishes() {
    let store = Arc::new(InMemoryContentStore::new(vec![Category::new(2, "Blog")]));
    let publisher = Arc::new(InMemoryPublisher::default());
    let settings = Settings::default();

    let model = Arc::new(scripted_blog_run(scripted_blog_run(ScriptedModel::new())));
    let pipeline = publish::pipeline(
        &agents(&model),
        store.clone(),
        Some(publisher.clone()),
        &settings,
    )
    .unwrap();
    let run = pipeline.execute(&json!({"topic": "School pickups"})).await;

    assert!(run.is_completed(), "{:?}", run.error());
    let article_id = run
        .final_value(publish::PUBLISHING_STAGE, "article_id")
        .and_then(Value::as_u64)
        .unwrap();
    let stored = store.get_article(article_id).await.unwrap().unwrap();
    assert_eq!(stored.article.slug, "safe-school-pickups");
    assert_eq!(stored.article.content, "# Safe School Pickups\n\nEvery afternoon...");

    let post_id = run
        .final_value(publish::PUBLISHING_STAGE, "wordpress_post_id")
        .and_then(Value::as_u64)
        .unwrap();
    assert_eq!(publisher.post(post_id).unwrap().title, "Safe School Pickups");

    // A second run for the same article updates the stored record and the post.
    let again = pipeline.execute(&json!({"topic": "School pickups"})).await;
    assert!(again.is_completed());
    assert_eq!(
        again.final_value(publish::PUBLISHING_STAGE, "article_id").and_then(Value::as_u64),
        Some(article_id)
    );
    assert_eq!(store.len(), 1);
    assert_eq!(
        again.final_value(publish::PUBLISHING_STAGE, "wordpress_post_id").and_then(Value::as_u64),
        Some(post_id)
    );
    assert_eq!(publisher.post_count(), 1);
}
