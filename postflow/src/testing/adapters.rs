//! In-memory fakes for every adapter category.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::adapters::{
    Article, AudioEnhanceRequest, AudioGenerator, AudioRequest, CaptionFile, CaptionRequest, Category,
    FetchAdapter, FetchRequest, FetchedPage, ImageCandidate, ImageOptimizeRequest, ImageProcessor,
    ImageSearchRequest, Language, MediaFile, MediaUpload, OverlayRequest, PublishAdapter, PublishRequest,
    PublishedPost, SearchAdapter, SearchHit, SearchRequest, SearchResponse, UploadedMedia, VideoComposer,
    VideoOptimizeRequest, VideoRequest, Voice, VoicePreset,
};
use crate::errors::AdapterError;
use crate::utils::slugify;

/// Search fake that answers every query with canned hits.
#[derive(Debug, Default)]
pub struct FakeSearch {
    hits: Vec<SearchHit>,
    failing: bool,
    requests: Mutex<Vec<SearchRequest>>,
}

impl FakeSearch {
    /// Creates a fake that makes up three hits per query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers with `hits` instead.
    #[must_use]
    pub fn with_hits(mut self, hits: Vec<SearchHit>) -> Self {
        self.hits = hits;
        self
    }

    /// Fails every search.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Returns the requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl SearchAdapter for FakeSearch {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, AdapterError> {
        self.requests.lock().push(request.clone());
        if self.failing {
            return Err(AdapterError::search_unavailable("fake search is down"));
        }

        let hits = if self.hits.is_empty() {
            (1..=3)
                .map(|i| SearchHit {
                    title: format!("{} #{i}", request.query),
                    link: format!("https://example.com/{}/{i}", slugify(&request.query)),
                    snippet: format!("About {}", request.query),
                    position: Some(i),
                    source: Some("example.com".to_string()),
                })
                .collect()
        } else {
            self.hits.clone()
        };
        let total = hits.len() as u64;
        let results = hits.into_iter().take(request.limit as usize).collect();

        Ok(SearchResponse {
            results,
            total_results: total,
            search_time: 0.01,
            query: request.query.clone(),
        })
    }
}

/// Fetch fake serving pages from a fixed table.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, FetchedPage>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl StaticFetcher {
    /// Creates a fetcher with no pages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves a page at `url`.
    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        let url = url.into();
        self.pages.insert(
            url.clone(),
            FetchedPage {
                url,
                title: title.into(),
                description: String::new(),
                content: content.into(),
                metadata: BTreeMap::new(),
                images: None,
                links: None,
            },
        );
        self
    }

    /// Returns the requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl FetchAdapter for StaticFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedPage, AdapterError> {
        self.requests.lock().push(request.clone());
        let mut page = self
            .pages
            .get(&request.url)
            .cloned()
            .ok_or_else(|| AdapterError::fetch_failed(&request.url, "HTTP 404"))?;
        if request.extract_images {
            page.images.get_or_insert_with(Vec::new);
        }
        if request.extract_links {
            page.links.get_or_insert_with(Vec::new);
        }
        Ok(page)
    }
}

/// Narration fake. Durations are 80ms per character.
#[derive(Debug, Default)]
pub struct FakeAudio {
    failing_enhance: bool,
    generated: Mutex<Vec<AudioRequest>>,
    enhanced: Mutex<Vec<AudioEnhanceRequest>>,
}

impl FakeAudio {
    /// Creates a working fake.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every enhancement.
    #[must_use]
    pub fn failing_enhance(mut self) -> Self {
        self.failing_enhance = true;
        self
    }

    /// Returns the narration requests received so far.
    #[must_use]
    pub fn generated(&self) -> Vec<AudioRequest> {
        self.generated.lock().clone()
    }

    /// Returns the enhancement requests received so far.
    #[must_use]
    pub fn enhanced(&self) -> Vec<AudioEnhanceRequest> {
        self.enhanced.lock().clone()
    }
}

#[async_trait]
impl AudioGenerator for FakeAudio {
    async fn generate_audio(&self, request: &AudioRequest) -> Result<MediaFile, AdapterError> {
        self.generated.lock().push(request.clone());
        if request.text.trim().is_empty() {
            return Err(AdapterError::media_failed("generate_audio", "text is empty"));
        }
        let chars = request.text.chars().count() as u64;
        let name = request.file_name.clone().unwrap_or_else(|| "narration.mp3".to_string());
        Ok(MediaFile::new(format!("output/{name}"), chars * 1_000)
            .with_duration_ms(chars * 80)
            .with_format("mp3"))
    }

    async fn enhance_audio(&self, request: &AudioEnhanceRequest) -> Result<MediaFile, AdapterError> {
        self.enhanced.lock().push(request.clone());
        if self.failing_enhance {
            return Err(AdapterError::media_failed("enhance_audio", "enhancer unavailable"));
        }
        let name = request.output_file_name.clone().unwrap_or_else(|| {
            let stem = Path::new(&request.input_path)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("audio");
            format!("{stem}_enhanced.mp3")
        });
        Ok(MediaFile::new(format!("output/{name}"), 900).with_original_size(1_000).with_format("mp3"))
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, AdapterError> {
        Ok([Language::Japanese, Language::English]
            .into_iter()
            .map(|language| {
                let preset = VoicePreset::for_language(language);
                Voice {
                    voice_id: preset.voice_id.to_string(),
                    name: preset.voice_name.to_string(),
                }
            })
            .collect())
    }
}

/// Image fake that invents candidates and pretends to recompress them.
#[derive(Debug, Default)]
pub struct FakeImage {
    searches: Mutex<Vec<ImageSearchRequest>>,
    optimized: Mutex<Vec<ImageOptimizeRequest>>,
}

impl FakeImage {
    /// Creates the fake.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the search requests received so far.
    #[must_use]
    pub fn searches(&self) -> Vec<ImageSearchRequest> {
        self.searches.lock().clone()
    }

    /// Returns the optimize requests received so far.
    #[must_use]
    pub fn optimized(&self) -> Vec<ImageOptimizeRequest> {
        self.optimized.lock().clone()
    }
}

#[async_trait]
impl ImageProcessor for FakeImage {
    async fn search_images(&self, request: &ImageSearchRequest) -> Result<Vec<ImageCandidate>, AdapterError> {
        self.searches.lock().push(request.clone());
        let slug = slugify(&request.keyword);
        Ok((1..=request.limit)
            .map(|i| ImageCandidate {
                url: format!("https://images.example.com/{slug}-{i}.jpg"),
                title: format!("{} {i}", request.keyword),
                credit: Some("Example Photos".to_string()),
            })
            .collect())
    }

    async fn optimize_image(&self, request: &ImageOptimizeRequest) -> Result<MediaFile, AdapterError> {
        self.optimized.lock().push(request.clone());
        if !request.image_url.starts_with("http") {
            return Err(AdapterError::media_failed("optimize_image", "image URL is not absolute"));
        }
        let name = request.file_name.clone().unwrap_or_else(|| {
            request
                .image_url
                .rsplit('/')
                .next()
                .unwrap_or("image.jpg")
                .to_string()
        });
        let width = request.width.unwrap_or(1200);
        Ok(MediaFile::new(format!("output/{name}"), 60_000)
            .with_original_size(240_000)
            .with_resolution(width, width * 2 / 3)
            .with_format("jpg"))
    }
}

/// Video fake. Records the operations it was asked to perform.
#[derive(Debug, Default)]
pub struct FakeVideo {
    calls: Mutex<Vec<String>>,
}

impl FakeVideo {
    /// Creates the fake.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of the operations called, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, operation: &str) {
        self.calls.lock().push(operation.to_string());
    }
}

#[async_trait]
impl VideoComposer for FakeVideo {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    async fn create_video(&self, request: &VideoRequest) -> Result<MediaFile, AdapterError> {
        self.record("create_video");
        if request.images_paths.is_empty() {
            return Err(AdapterError::media_failed("create_video", "no images"));
        }
        let spec = request.platform.spec();
        let name = request.output_file_name.clone().unwrap_or_else(|| "video.mp4".to_string());
        Ok(MediaFile::new(format!("output/{name}"), 5_000_000)
            .with_duration_ms((request.duration_secs * 1000.0) as u64)
            .with_resolution(spec.width, spec.height)
            .with_format(spec.format))
    }

    async fn add_text_overlay(&self, request: &OverlayRequest) -> Result<MediaFile, AdapterError> {
        self.record("add_text_overlay");
        let name = request
            .output_file_name
            .clone()
            .unwrap_or_else(|| "video_overlay.mp4".to_string());
        Ok(MediaFile::new(format!("output/{name}"), 5_100_000).with_format("mp4"))
    }

    async fn optimize_video(&self, request: &VideoOptimizeRequest) -> Result<MediaFile, AdapterError> {
        self.record("optimize_video");
        let spec = request.platform.spec();
        Ok(
            MediaFile::new(format!("output/{}_optimized.mp4", request.platform.as_str()), 3_000_000)
                .with_original_size(5_100_000)
                .with_resolution(spec.width, spec.height)
                .with_format(spec.format),
        )
    }

    async fn generate_captions(&self, request: &CaptionRequest) -> Result<CaptionFile, AdapterError> {
        self.record("generate_captions");
        let name = request
            .output_file_name
            .clone()
            .unwrap_or_else(|| format!("captions.{}", serde_json::json!(request.format).as_str().unwrap_or("srt")));
        Ok(CaptionFile {
            file_path: format!("output/{name}"),
            word_count: 42,
            duration_secs: 30.0,
            language: request.language,
            format: request.format,
        })
    }
}

#[derive(Debug, Clone)]
struct PostRecord {
    article: Article,
    featured_media: Option<u64>,
}

/// Publish fake holding posts in memory.
///
/// Behaves like an upsert endpoint: publishing with an existing id updates
/// that post and returns the same id.
#[derive(Debug)]
pub struct InMemoryPublisher {
    categories: Vec<Category>,
    posts: Mutex<BTreeMap<u64, PostRecord>>,
    media: Mutex<BTreeMap<u64, MediaUpload>>,
    next_id: AtomicU64,
    publish_calls: AtomicU64,
    failing: AtomicBool,
}

impl Default for InMemoryPublisher {
    fn default() -> Self {
        Self::new(vec![Category::new(1, "Uncategorized"), Category::new(10, "Blog")])
    }
}

impl InMemoryPublisher {
    /// Creates a publisher offering `categories`.
    #[must_use]
    pub fn new(categories: Vec<Category>) -> Self {
        Self {
            categories,
            posts: Mutex::new(BTreeMap::new()),
            media: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(100),
            publish_calls: AtomicU64::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Makes every publish call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns the stored article for `id`.
    #[must_use]
    pub fn post(&self, id: u64) -> Option<Article> {
        self.posts.lock().get(&id).map(|p| p.article.clone())
    }

    /// Returns the featured media of `id`.
    #[must_use]
    pub fn featured_media(&self, id: u64) -> Option<u64> {
        self.posts.lock().get(&id).and_then(|p| p.featured_media)
    }

    /// Returns the number of distinct posts.
    #[must_use]
    pub fn post_count(&self) -> usize {
        self.posts.lock().len()
    }

    /// Returns how many publish calls were made.
    #[must_use]
    pub fn publish_calls(&self) -> u64 {
        self.publish_calls.load(Ordering::SeqCst)
    }

    /// Returns the number of uploaded media items.
    #[must_use]
    pub fn media_count(&self) -> usize {
        self.media.lock().len()
    }

    fn url(id: u64) -> String {
        format!("https://blog.example.com/?p={id}")
    }
}

#[async_trait]
impl PublishAdapter for InMemoryPublisher {
    async fn categories(&self) -> Result<Vec<Category>, AdapterError> {
        Ok(self.categories.clone())
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishedPost, AdapterError> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AdapterError::publish_failed("memory", "service unavailable"));
        }
        let article = &request.article;
        if !self.categories.iter().any(|c| c.id == article.category_id) {
            return Err(AdapterError::category_invalid("memory", article.category_id));
        }

        let mut posts = self.posts.lock();
        let id = match request.existing_id {
            Some(id) => {
                let post = posts
                    .get_mut(&id)
                    .ok_or_else(|| AdapterError::publish_failed("memory", format!("post {id} not found")))?;
                post.article = article.clone();
                id
            }
            None => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                posts.insert(
                    id,
                    PostRecord {
                        article: article.clone(),
                        featured_media: None,
                    },
                );
                id
            }
        };

        Ok(PublishedPost {
            id,
            url: Self::url(id),
            status: article.status,
        })
    }

    async fn upload_media(&self, upload: &MediaUpload) -> Result<UploadedMedia, AdapterError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let file_name = Path::new(&upload.file_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        self.media.lock().insert(id, upload.clone());
        Ok(UploadedMedia {
            id,
            url: format!("https://blog.example.com/wp-content/uploads/{file_name}"),
        })
    }

    async fn set_featured_media(&self, post_id: u64, media_id: u64) -> Result<(), AdapterError> {
        if !self.media.lock().contains_key(&media_id) {
            return Err(AdapterError::publish_failed("memory", format!("media {media_id} not found")));
        }
        let mut posts = self.posts.lock();
        let post = posts
            .get_mut(&post_id)
            .ok_or_else(|| AdapterError::publish_failed("memory", format!("post {post_id} not found")))?;
        post.featured_media = Some(media_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{CaptionFormat, Platform, PostStatus};
    use pretty_assertions::assert_eq;

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            content: "Body".to_string(),
            excerpt: String::new(),
            keywords: Vec::new(),
            slug: slugify(title),
            category_id: 10,
            status: PostStatus::Draft,
        }
    }

    #[tokio::test]
    async fn test_publish_is_idempotent_with_existing_id() {
        let publisher = InMemoryPublisher::default();
        let first = publisher
            .publish(&PublishRequest {
                article: article("Safe rides"),
                existing_id: None,
            })
            .await
            .unwrap();
        let second = publisher
            .publish(&PublishRequest {
                article: article("Safe rides, updated"),
                existing_id: Some(first.id),
            })
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(publisher.post_count(), 1);
        assert_eq!(publisher.post(first.id).unwrap().title, "Safe rides, updated");
        assert_eq!(publisher.publish_calls(), 2);
    }

    #[tokio::test]
    async fn test_publish_rejects_unknown_category() {
        let publisher = InMemoryPublisher::default();
        let mut bad = article("x");
        bad.category_id = 99;
        let err = publisher
            .publish(&PublishRequest {
                article: bad,
                existing_id: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "category_invalid");
    }

    #[tokio::test]
    async fn test_featured_media() {
        let publisher = InMemoryPublisher::default();
        let post = publisher
            .publish(&PublishRequest {
                article: article("Pics"),
                existing_id: None,
            })
            .await
            .unwrap();
        let media = publisher
            .upload_media(&MediaUpload {
                file_path: "output/pic.jpg".to_string(),
                title: None,
                caption: None,
                alt_text: None,
            })
            .await
            .unwrap();

        publisher.set_featured_media(post.id, media.id).await.unwrap();
        assert_eq!(publisher.featured_media(post.id), Some(media.id));
        assert!(media.url.ends_with("pic.jpg"));
        assert!(publisher.set_featured_media(post.id, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_static_fetcher() {
        let fetcher = StaticFetcher::new().with_page("https://a.example", "A", "text");
        let page = fetcher.fetch(&FetchRequest::new("https://a.example")).await.unwrap();
        assert_eq!(page.title, "A");
        assert!(fetcher.fetch(&FetchRequest::new("https://b.example")).await.is_err());
        assert_eq!(fetcher.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_fake_media() {
        let audio = FakeAudio::new();
        let file = audio
            .generate_audio(&AudioRequest::for_language("hello", Language::English))
            .await
            .unwrap();
        assert_eq!(file.duration_ms, Some(400));

        let video = FakeVideo::new();
        let captions = video
            .generate_captions(&CaptionRequest {
                video_path: "output/v.mp4".to_string(),
                language: Language::Japanese,
                format: CaptionFormat::Vtt,
                output_file_name: None,
            })
            .await
            .unwrap();
        assert_eq!(captions.file_path, "output/captions.vtt");

        let clip = video
            .create_video(&VideoRequest {
                images_paths: vec!["a.jpg".to_string()],
                audio_path: None,
                output_file_name: None,
                platform: Platform::Tiktok,
                duration_secs: 12.5,
                transition: crate::adapters::Transition::Fade,
                watermark: None,
                caption: None,
            })
            .await
            .unwrap();
        assert_eq!(clip.duration_ms, Some(12_500));
        assert_eq!(video.calls(), vec!["generate_captions", "create_video"]);
    }
}
