//! External service adapters.
//!
//! Each adapter category is one narrow async trait with typed requests and
//! responses and a typed [`AdapterError`](crate::errors::AdapterError)
//! failure. Adapters keep no state between calls.
//!
//! | Category | Trait |
//! |---|---|
//! | Search | [`SearchAdapter`] |
//! | URL fetch | [`FetchAdapter`] |
//! | Media | [`AudioGenerator`], [`ImageProcessor`], [`VideoComposer`] |
//! | Publish | [`PublishAdapter`] |
//! | Datastore | [`ContentStore`] |
//!
//! HTTP implementations live in [`http`] behind the `http` feature.

pub mod fetch;
pub mod media;
pub mod publish;
pub mod search;
pub mod store;

#[cfg(feature = "http")]
pub mod http;

pub use fetch::{FetchAdapter, FetchRequest, FetchedPage, PageLink};
pub use media::{
    AudioEnhanceRequest, AudioGenerator, AudioRequest, CaptionFile, CaptionFormat, CaptionRequest,
    ImageCandidate, ImageOptimizeRequest, ImageProcessor, ImageSearchRequest, Language, MediaFile,
    OverlayPosition, OverlayRequest, Platform, PlatformSpec, TextOverlay, Transition, VideoComposer,
    VideoOptimizeRequest, VideoQuality, VideoRequest, Voice, VoicePreset,
};
pub use publish::{
    choose_category, Article, Category, MediaUpload, PostStatus, PublishAdapter, PublishRequest,
    PublishedPost, UploadedMedia,
};
pub use search::{SearchAdapter, SearchEngine, SearchHit, SearchRequest, SearchResponse};
pub use store::{ContentStore, InMemoryContentStore, StoredArticle};
