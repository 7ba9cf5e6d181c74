//! Saving an edited article to the datastore and pushing it to the CMS.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use super::blog::{self, BlogAgents, EditedArticle};
use crate::adapters::{choose_category, Article, ContentStore, PostStatus, PublishAdapter, PublishRequest, PublishedPost};
use crate::config::Settings;
use crate::context::StageContext;
use crate::core::StageResult;
use crate::errors::{AdapterError, ContextError, PipelineDefinitionError, PostflowError};
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::stages::Stage;
use crate::utils::slugify;

/// Pipeline name of the blog-and-publish workflow.
pub const BLOG_PUBLISH_PIPELINE: &str = "escort-blog-publish";
/// Publish stage.
pub const PUBLISHING_STAGE: &str = "publishing";

/// Stores the article and publishes it.
///
/// The datastore save is fatal on failure. A CMS failure after a successful
/// save does not fail the stage: the result keeps the saved article id next
/// to `wordpress_error` and is marked `degraded` so the caller can
/// reconcile.
///
/// The CMS post id is kept with the stored article; publishing the same
/// slug again updates that post.
pub struct PublishStage {
    store: Arc<dyn ContentStore>,
    publisher: Option<Arc<dyn PublishAdapter>>,
    source_stage: String,
    status: PostStatus,
    store_categories: Vec<u64>,
    cms_categories: Vec<u64>,
}

impl PublishStage {
    /// Creates the stage. Without a publisher only the datastore is written.
    #[must_use]
    pub fn new(store: Arc<dyn ContentStore>, publisher: Option<Arc<dyn PublishAdapter>>, settings: &Settings) -> Self {
        Self {
            store,
            publisher,
            source_stage: blog::EDITING_STAGE.to_string(),
            status: settings.wordpress.status,
            store_categories: settings.store.preferred_category_ids.clone(),
            cms_categories: settings.wordpress.preferred_category_ids.clone(),
        }
    }

    /// Reads the article from `stage` instead of the blog editor.
    #[must_use]
    pub fn with_source_stage(mut self, stage: impl Into<String>) -> Self {
        self.source_stage = stage.into();
        self
    }

    async fn publish_to_cms(
        &self,
        publisher: &dyn PublishAdapter,
        article: &Article,
        existing_id: Option<u64>,
    ) -> Result<PublishedPost, AdapterError> {
        let categories = publisher.categories().await?;
        let category = choose_category("wordpress", &categories, &self.cms_categories)?;
        let request = PublishRequest {
            article: Article {
                category_id: category.id,
                ..article.clone()
            },
            existing_id,
        };
        publisher.publish(&request).await
    }
}

impl fmt::Debug for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishStage")
            .field("source_stage", &self.source_stage)
            .field("status", &self.status)
            .field("has_publisher", &self.publisher.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for PublishStage {
    fn name(&self) -> &str {
        PUBLISHING_STAGE
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageResult, PostflowError> {
        let edited: EditedArticle = ctx
            .inputs()
            .result(&self.source_stage)?
            .parse()
            .map_err(|e| ContextError::FieldType {
                stage: self.source_stage.clone(),
                key: "$".to_string(),
                expected: e.to_string(),
            })?;

        let categories = self.store.categories().await?;
        let category = choose_category("datastore", &categories, &self.store_categories)?;
        let article = Article {
            slug: slugify(&edited.title),
            title: edited.title,
            content: edited.body_markdown,
            excerpt: edited.meta_description,
            keywords: edited.keywords,
            category_id: category.id,
            status: self.status,
        };

        let stored = self.store.upsert_article(&article).await?;
        info!(article_id = stored.id, slug = %article.slug, "Article saved");

        let result = StageResult::single("article_id", stored.id)
            .with("slug", article.slug.clone())
            .with("content_hash", stored.content_hash)
            .with("category", category.name.clone());

        let Some(publisher) = &self.publisher else {
            return Ok(result.with("wordpress_skipped", true));
        };

        match self
            .publish_to_cms(publisher.as_ref(), &article, stored.cms_post_id)
            .await
        {
            Ok(post) => {
                info!(post_id = post.id, url = %post.url, updated = stored.cms_post_id.is_some(), "Article published");
                let result = result
                    .with("wordpress_post_id", post.id)
                    .with("wordpress_url", post.url)
                    .with("wordpress_status", post.status.as_str());
                if stored.cms_post_id == Some(post.id) {
                    return Ok(result);
                }
                match self.store.link_cms_post(stored.id, post.id).await {
                    Ok(()) => Ok(result),
                    Err(error) => {
                        warn!(article_id = stored.id, post_id = post.id, error = %error, "Could not record CMS post id");
                        Ok(result
                            .with("cms_link_error", error.to_string())
                            .with_metadata("degraded", Value::Bool(true)))
                    }
                }
            }
            Err(error) => {
                warn!(article_id = stored.id, error = %error, "Publishing failed after datastore save");
                Ok(result
                    .with("wordpress_error", error.to_string())
                    .with("wordpress_error_kind", error.kind())
                    .with_metadata("degraded", Value::Bool(true)))
            }
        }
    }
}

/// Builds the blog pipeline followed by the publish stage.
pub fn pipeline(
    agents: &BlogAgents,
    store: Arc<dyn ContentStore>,
    publisher: Option<Arc<dyn PublishAdapter>>,
    settings: &Settings,
) -> Result<Pipeline, PipelineDefinitionError> {
    blog::stages(agents)
        .into_iter()
        .fold(
            PipelineBuilder::new(BLOG_PUBLISH_PIPELINE).input_schema(blog::trigger_schema()),
            PipelineBuilder::stage,
        )
        .stage(Arc::new(PublishStage::new(store, publisher, settings)))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::MockContentStore;
    use crate::adapters::{Category, InMemoryContentStore};
    use crate::testing::{InMemoryPublisher, StageFixture};
    use serde_json::json;

    fn edited() -> StageResult {
        StageResult::from_value(json!({
            "title": "Safe School Pickups",
            "meta_description": "How we get children home safely.",
            "keywords": ["pickup", "safety"],
            "category": "Blog",
            "cta": "Book a trial ride",
            "body_markdown": "# Safe School Pickups\n\nBody.",
        }))
    }

    fn fixture() -> StageFixture {
        StageFixture::new().with_result(blog::EDITING_STAGE, edited())
    }

    fn store() -> Arc<InMemoryContentStore> {
        Arc::new(InMemoryContentStore::new(vec![Category::new(2, "Blog")]))
    }

    #[tokio::test]
    async fn test_saves_and_publishes() {
        let store = store();
        let publisher = Arc::new(InMemoryPublisher::default());
        let stage = PublishStage::new(store.clone(), Some(publisher.clone()), &Settings::default());
        let fixture = fixture();

        let result = stage.run(&fixture.ctx(PUBLISHING_STAGE, 3)).await.unwrap();

        let article_id = result.get("article_id").and_then(Value::as_u64).unwrap();
        let saved = store.get_article(article_id).await.unwrap().unwrap();
        assert_eq!(saved.article.title, "Safe School Pickups");
        assert_eq!(saved.article.slug, "safe-school-pickups");
        assert_eq!(saved.article.category_id, 2);

        let post_id = result.get("wordpress_post_id").and_then(Value::as_u64).unwrap();
        let post = publisher.post(post_id).unwrap();
        assert_eq!(post.category_id, 10);
        assert_eq!(post.excerpt, "How we get children home safely.");
        assert_eq!(result.get_str("wordpress_status"), Some("draft"));
        assert!(result.metadata("degraded").is_none());
    }

    #[tokio::test]
    async fn test_republish_updates_same_post() {
        let store = store();
        let publisher = Arc::new(InMemoryPublisher::default());
        let stage = PublishStage::new(store.clone(), Some(publisher.clone()), &Settings::default());
        let fixture = fixture();

        let first = stage.run(&fixture.ctx(PUBLISHING_STAGE, 3)).await.unwrap();
        let second = stage.run(&fixture.ctx(PUBLISHING_STAGE, 3)).await.unwrap();

        let post_id = first.get("wordpress_post_id").and_then(Value::as_u64).unwrap();
        assert_eq!(second.get("wordpress_post_id").and_then(Value::as_u64), Some(post_id));
        assert_eq!(publisher.post_count(), 1);
        assert_eq!(publisher.publish_calls(), 2);

        let article_id = first.get("article_id").and_then(Value::as_u64).unwrap();
        let saved = store.get_article(article_id).await.unwrap().unwrap();
        assert_eq!(saved.cms_post_id, Some(post_id));
    }

    #[tokio::test]
    async fn test_cms_failure_is_degraded() {
        let store = store();
        let publisher = Arc::new(InMemoryPublisher::default());
        publisher.set_failing(true);
        let stage = PublishStage::new(store.clone(), Some(publisher), &Settings::default());
        let fixture = fixture();

        let result = stage.run(&fixture.ctx(PUBLISHING_STAGE, 3)).await.unwrap();

        assert!(result.get("article_id").is_some());
        assert!(result.get_str("wordpress_error").unwrap().contains("service unavailable"));
        assert_eq!(result.get_str("wordpress_error_kind"), Some("publish_failed"));
        assert_eq!(result.metadata("degraded"), Some(&json!(true)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_datastore_failure_is_fatal() {
        let mut store = MockContentStore::new();
        store
            .expect_categories()
            .returning(|| Ok(vec![Category::new(1, "General")]));
        store
            .expect_upsert_article()
            .returning(|_| Err(AdapterError::publish_failed("datastore", "disk full")));
        let publisher = Arc::new(InMemoryPublisher::default());
        let stage = PublishStage::new(Arc::new(store), Some(publisher.clone()), &Settings::default());
        let fixture = fixture();

        let err = stage.run(&fixture.ctx(PUBLISHING_STAGE, 3)).await.unwrap_err();

        assert_eq!(err.kind(), "publish_failed");
        assert_eq!(publisher.publish_calls(), 0);
    }

    #[tokio::test]
    async fn test_no_matching_category() {
        let store = Arc::new(InMemoryContentStore::new(vec![Category::new(7, "Other")]));
        let stage = PublishStage::new(store, None, &Settings::default());
        let fixture = fixture();

        let err = stage.run(&fixture.ctx(PUBLISHING_STAGE, 3)).await.unwrap_err();
        assert_eq!(err.kind(), "category_invalid");
    }

    #[tokio::test]
    async fn test_without_publisher() {
        let stage = PublishStage::new(store(), None, &Settings::default());
        let fixture = fixture();
        let result = stage.run(&fixture.ctx(PUBLISHING_STAGE, 3)).await.unwrap();
        assert_eq!(result.get("wordpress_skipped"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_malformed_source_record() {
        let stage = PublishStage::new(store(), None, &Settings::default());
        let fixture = StageFixture::new().with_result(blog::EDITING_STAGE, StageResult::single("title", "only"));
        let err = stage.run(&fixture.ctx(PUBLISHING_STAGE, 3)).await.unwrap_err();
        assert_eq!(err.kind(), "context");
    }
}
