//! Blog image workflow: find, optimize and upload pictures for a post.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::sync::Arc;
use tracing::{debug, info};

use super::{committed, run_tag};
use crate::adapters::{
    ImageCandidate, ImageOptimizeRequest, ImageProcessor, ImageSearchRequest, MediaFile, MediaUpload,
    PublishAdapter, UploadedMedia,
};
use crate::agents::{personas, Agent, Capabilities, ModelRef};
use crate::config::MediaSettings;
use crate::context::StageContext;
use crate::contracts::{FieldSpec, Schema};
use crate::core::StageResult;
use crate::errors::{AdapterError, AgentInvocationError, PipelineDefinitionError, PostflowError};
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::stages::Stage;
use crate::utils::slugify;

/// Pipeline name.
pub const IMAGE_PIPELINE: &str = "blog-image";
/// Search stage.
pub const SEARCH_STAGE: &str = "image_search";
/// Optimize stage.
pub const OPTIMIZE_STAGE: &str = "image_optimize";
/// Upload stage.
pub const UPLOAD_STAGE: &str = "image_upload";

/// Candidates fetched per wanted image when a curator ranks them.
const CURATION_POOL_FACTOR: u32 = 3;
const MAX_CURATION_POOL: u32 = 20;

/// Trigger schema of the image workflow.
#[must_use]
pub fn trigger_schema() -> Schema {
    Schema::new("blog_image_trigger")
        .field(FieldSpec::string("blogTitle").required().with_min_length(1))
        .field(FieldSpec::string("blogContent").required())
        .field(FieldSpec::string("keywords").with_description("Comma-separated keywords"))
        .field(FieldSpec::integer("postId").at_least(1.0).with_description("Post to attach a featured image to"))
        .field(FieldSpec::integer("imageCount").between(1.0, 10.0).with_default(1))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageTrigger {
    blog_title: String,
    #[serde(default)]
    keywords: Option<String>,
    #[serde(default)]
    post_id: Option<u64>,
    image_count: u32,
}

impl ImageTrigger {
    fn read(ctx: &StageContext<'_>) -> Result<Self, PostflowError> {
        Ok(ctx.trigger().parse()?)
    }

    /// First non-blank keyword, or the title when none is given.
    fn search_keyword(&self) -> String {
        self.keywords
            .as_deref()
            .and_then(|k| k.split(',').map(str::trim).find(|k| !k.is_empty()))
            .unwrap_or(&self.blog_title)
            .to_string()
    }
}

/// Candidates found for the post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSearchOutput {
    /// Keyword that was searched.
    pub keyword: String,
    /// Candidates in ranking order.
    pub candidates: Vec<ImageCandidate>,
}

/// One optimized image and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizedImage {
    /// The candidate that was optimized.
    pub source: ImageCandidate,
    /// The optimized file.
    pub file: MediaFile,
}

/// Optimized files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOptimizeOutput {
    /// Optimized images in candidate order.
    pub images: Vec<OptimizedImage>,
}

/// Uploaded media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUploadOutput {
    /// Uploaded items in candidate order.
    pub uploads: Vec<UploadedMedia>,
    /// Media set as the post's featured image.
    pub featured_media_id: Option<u64>,
}

/// The curator's answer: indexes into the candidate list, best first.
#[derive(Debug, Deserialize)]
struct CuratorPicks {
    picks: Vec<usize>,
}

/// Binds the image-curator agent that ranks search candidates.
#[must_use]
pub fn curator(model: &ModelRef) -> Agent {
    Agent::bind("image_curator", personas::IMAGE_CURATOR, model.clone(), Capabilities::none())
}

fn curation_prompt(trigger: &ImageTrigger, candidates: &[ImageCandidate], wanted: u32) -> String {
    let mut prompt = format!(
        "Choose the {wanted} best images for the blog post \"{}\".\n\nCandidates:\n",
        trigger.blog_title
    );
    for (index, candidate) in candidates.iter().enumerate() {
        let _ = writeln!(prompt, "{index}. {} ({})", candidate.title, candidate.url);
    }
    prompt.push_str("\nAnswer with JSON only: {\"picks\": [candidate numbers, best first]}");
    prompt
}

async fn curate(
    agent: &Agent,
    trigger: &ImageTrigger,
    candidates: Vec<ImageCandidate>,
    wanted: u32,
) -> Result<Vec<ImageCandidate>, AgentInvocationError> {
    let answer: CuratorPicks = agent
        .respond_json(&curation_prompt(trigger, &candidates, wanted))
        .await?;

    let mut picked: Vec<usize> = Vec::new();
    for index in answer.picks {
        if index < candidates.len() && !picked.contains(&index) {
            picked.push(index);
        }
    }
    picked.truncate(wanted as usize);
    if picked.is_empty() {
        return Err(AgentInvocationError::MalformedResponse {
            agent: agent.name().to_string(),
            message: format!("no valid pick among {} candidates", candidates.len()),
        });
    }
    debug!(picks = ?picked, "Curator ranked candidates");

    let mut slots: Vec<Option<ImageCandidate>> = candidates.into_iter().map(Some).collect();
    Ok(picked.into_iter().filter_map(|i| slots[i].take()).collect())
}

/// Searches for candidate images, optionally letting a curator agent rank
/// them.
pub struct ImageSearchStage {
    images: Arc<dyn ImageProcessor>,
    curator: Option<Arc<Agent>>,
}

#[async_trait]
impl Stage for ImageSearchStage {
    fn name(&self) -> &str {
        SEARCH_STAGE
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageResult, PostflowError> {
        let trigger = ImageTrigger::read(ctx)?;
        let wanted = trigger.image_count;
        let limit = match self.curator {
            Some(_) => (wanted * CURATION_POOL_FACTOR).clamp(wanted, MAX_CURATION_POOL.max(wanted)),
            None => wanted,
        };
        let request = ImageSearchRequest {
            keyword: trigger.search_keyword(),
            limit,
        };
        let mut candidates = self.images.search_images(&request).await?;
        if candidates.is_empty() {
            return Err(AdapterError::media_failed("search_images", format!("no images for '{}'", request.keyword)).into());
        }
        debug!(keyword = %request.keyword, found = candidates.len(), "Image candidates found");
        candidates = match &self.curator {
            Some(agent) => curate(agent, &trigger, candidates, wanted).await?,
            None => {
                candidates.truncate(wanted as usize);
                candidates
            }
        };

        committed(ImageSearchOutput {
            keyword: request.keyword,
            candidates,
        })
    }
}

/// Downloads and recompresses the candidates for the web.
pub struct ImageOptimizeStage {
    images: Arc<dyn ImageProcessor>,
    width: u32,
    quality: u8,
}

#[async_trait]
impl Stage for ImageOptimizeStage {
    fn name(&self) -> &str {
        OPTIMIZE_STAGE
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageResult, PostflowError> {
        let trigger = ImageTrigger::read(ctx)?;
        let search: ImageSearchOutput = ctx.inputs().result(SEARCH_STAGE)?.parse()?;
        let stem = format!("{}-{}", slugify(&trigger.blog_title), run_tag(ctx));

        let mut images = Vec::with_capacity(search.candidates.len());
        for (index, candidate) in search.candidates.into_iter().enumerate() {
            let request = ImageOptimizeRequest {
                image_url: candidate.url.clone(),
                file_name: Some(format!("{stem}-{}.jpg", index + 1)),
                width: Some(self.width),
                quality: self.quality,
            };
            let file = self.images.optimize_image(&request).await?;
            images.push(OptimizedImage { source: candidate, file });
        }

        committed(ImageOptimizeOutput { images })
    }
}

/// Uploads the optimized images and sets the featured image.
pub struct ImageUploadStage {
    publisher: Arc<dyn PublishAdapter>,
}

#[async_trait]
impl Stage for ImageUploadStage {
    fn name(&self) -> &str {
        UPLOAD_STAGE
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageResult, PostflowError> {
        let trigger = ImageTrigger::read(ctx)?;
        let optimized: ImageOptimizeOutput = ctx.inputs().result(OPTIMIZE_STAGE)?.parse()?;

        let mut uploads = Vec::with_capacity(optimized.images.len());
        for image in &optimized.images {
            let upload = MediaUpload {
                file_path: image.file.file_path.clone(),
                title: Some(trigger.blog_title.clone()),
                caption: image.source.credit.clone(),
                alt_text: Some(if image.source.title.is_empty() {
                    trigger.blog_title.clone()
                } else {
                    image.source.title.clone()
                }),
            };
            uploads.push(self.publisher.upload_media(&upload).await?);
        }

        let featured_media_id = match (trigger.post_id, uploads.first()) {
            (Some(post_id), Some(first)) => {
                self.publisher.set_featured_media(post_id, first.id).await?;
                info!(post_id, media_id = first.id, "Featured image set");
                Some(first.id)
            }
            _ => None,
        };

        committed(ImageUploadOutput {
            uploads,
            featured_media_id,
        })
    }
}

impl fmt::Debug for ImageSearchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageSearchStage")
            .field("curator", &self.curator.as_ref().map(|a| a.name()))
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for ImageOptimizeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageOptimizeStage")
            .field("width", &self.width)
            .field("quality", &self.quality)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for ImageUploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUploadStage").finish_non_exhaustive()
    }
}

/// Builds the image pipeline; candidates are taken in search order.
pub fn pipeline(
    images: Arc<dyn ImageProcessor>,
    publisher: Arc<dyn PublishAdapter>,
    media: &MediaSettings,
) -> Result<Pipeline, PipelineDefinitionError> {
    build(images, publisher, media, None)
}

/// Builds the image pipeline with `curator` choosing among a wider pool of
/// candidates.
pub fn curated_pipeline(
    images: Arc<dyn ImageProcessor>,
    publisher: Arc<dyn PublishAdapter>,
    media: &MediaSettings,
    curator: Arc<Agent>,
) -> Result<Pipeline, PipelineDefinitionError> {
    build(images, publisher, media, Some(curator))
}

fn build(
    images: Arc<dyn ImageProcessor>,
    publisher: Arc<dyn PublishAdapter>,
    media: &MediaSettings,
    curator: Option<Arc<Agent>>,
) -> Result<Pipeline, PipelineDefinitionError> {
    PipelineBuilder::new(IMAGE_PIPELINE)
        .input_schema(trigger_schema())
        .stage(Arc::new(ImageSearchStage {
            images: images.clone(),
            curator,
        }))
        .stage(Arc::new(ImageOptimizeStage {
            images,
            width: media.image_width,
            quality: media.image_quality,
        }))
        .stage(Arc::new(ImageUploadStage { publisher }))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{Article, PostStatus, PublishRequest};
    use crate::testing::{FakeImage, InMemoryPublisher, ScriptedModel};
    use serde_json::json;

    async fn existing_post(publisher: &InMemoryPublisher) -> u64 {
        publisher
            .publish(&PublishRequest {
                article: Article {
                    title: "Rainy days".to_string(),
                    content: "Body".to_string(),
                    excerpt: String::new(),
                    keywords: Vec::new(),
                    slug: "rainy-days".to_string(),
                    category_id: 10,
                    status: PostStatus::Draft,
                },
                existing_id: None,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_image_workflow_sets_featured_media() {
        let images = Arc::new(FakeImage::new());
        let publisher = Arc::new(InMemoryPublisher::default());
        let post_id = existing_post(&publisher).await;
        let pipeline = pipeline(images.clone(), publisher.clone(), &MediaSettings::default()).unwrap();

        let run = pipeline
            .execute(&json!({
                "blogTitle": "Rainy Day Pickups",
                "blogContent": "...",
                "keywords": " , umbrella, raincoat",
                "postId": post_id,
                "imageCount": 2,
            }))
            .await;

        assert!(run.is_completed(), "{:?}", run.error());
        assert_eq!(images.searches()[0].keyword, "umbrella");
        let tag: String = run.identity.run_id.simple().to_string().chars().take(8).collect();
        assert_eq!(
            images.optimized()[1].file_name,
            Some(format!("rainy-day-pickups-{tag}-2.jpg"))
        );
        assert_eq!(images.optimized()[0].width, Some(1200));

        let upload: ImageUploadOutput = run.result(UPLOAD_STAGE).unwrap().parse().unwrap();
        assert_eq!(upload.uploads.len(), 2);
        assert_eq!(publisher.featured_media(post_id), upload.featured_media_id);
        assert_eq!(publisher.media_count(), 2);
    }

    #[tokio::test]
    async fn test_image_workflow_without_post() {
        let images = Arc::new(FakeImage::new());
        let publisher = Arc::new(InMemoryPublisher::default());
        let pipeline = pipeline(images.clone(), publisher, &MediaSettings::default()).unwrap();

        let run = pipeline
            .execute(&json!({"blogTitle": "Safe Rides", "blogContent": "..."}))
            .await;

        assert!(run.is_completed());
        assert_eq!(images.searches()[0].keyword, "Safe Rides");
        assert_eq!(images.searches()[0].limit, 1);
        assert_eq!(run.final_value(UPLOAD_STAGE, "featured_media_id"), Some(&json!(null)));
    }

    #[tokio::test]
    async fn test_concurrent_runs_use_distinct_file_names() {
        let images = Arc::new(FakeImage::new());
        let pipeline = pipeline(images.clone(), Arc::new(InMemoryPublisher::default()), &MediaSettings::default()).unwrap();
        let trigger = json!({"blogTitle": "Safe Rides", "blogContent": "..."});

        let (a, b) = tokio::join!(pipeline.execute(&trigger), pipeline.execute(&trigger));

        assert!(a.is_completed() && b.is_completed());
        let names: Vec<_> = images.optimized().into_iter().filter_map(|r| r.file_name).collect();
        assert_eq!(names.len(), 2);
        assert_ne!(names[0], names[1]);
    }

    #[tokio::test]
    async fn test_curator_ranks_candidates() {
        let images = Arc::new(FakeImage::new());
        let model = Arc::new(ScriptedModel::new().reply(r#"```json
{"picks": [4, 2, 9, 2, 0]}
```"#));
        let agent = Arc::new(curator(&ModelRef::new(model.clone(), "test-model")));
        let pipeline = curated_pipeline(
            images.clone(),
            Arc::new(InMemoryPublisher::default()),
            &MediaSettings::default(),
            agent,
        )
        .unwrap();

        let run = pipeline
            .execute(&json!({"blogTitle": "Safe Rides", "blogContent": "...", "imageCount": 2}))
            .await;

        assert!(run.is_completed(), "{:?}", run.error());
        assert_eq!(images.searches()[0].limit, 6);
        let search: ImageSearchOutput = run.result(SEARCH_STAGE).unwrap().parse().unwrap();
        let urls: Vec<_> = search.candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://images.example.com/safe-rides-5.jpg",
                "https://images.example.com/safe-rides-3.jpg",
            ]
        );

        let request = &model.requests()[0];
        assert_eq!(request.messages[0].content, personas::IMAGE_CURATOR);
        assert!(request.messages[1].content.contains("5. Safe Rides 6 (https://images.example.com/safe-rides-6.jpg)"));
    }

    #[tokio::test]
    async fn test_curator_without_valid_pick_fails_search() {
        let model = Arc::new(ScriptedModel::new().reply(r#"{"picks": [42]}"#));
        let agent = Arc::new(curator(&ModelRef::new(model, "test-model")));
        let pipeline = curated_pipeline(
            Arc::new(FakeImage::new()),
            Arc::new(InMemoryPublisher::default()),
            &MediaSettings::default(),
            agent,
        )
        .unwrap();

        let run = pipeline
            .execute(&json!({"blogTitle": "Safe Rides", "blogContent": "..."}))
            .await;

        assert_eq!(run.failed_stage(), Some(SEARCH_STAGE));
        assert_eq!(run.error().map(|e| e.kind()), Some("agent_invocation"));
    }

    #[tokio::test]
    async fn test_image_count_bounds() {
        let pipeline = pipeline(
            Arc::new(FakeImage::new()),
            Arc::new(InMemoryPublisher::default()),
            &MediaSettings::default(),
        )
        .unwrap();

        let run = pipeline
            .execute(&json!({"blogTitle": "T", "blogContent": "c", "imageCount": 11}))
            .await;

        assert_eq!(run.error().and_then(|e| e.as_validation()).unwrap().field, "imageCount");
        assert!(run.context.is_empty());
    }
}
