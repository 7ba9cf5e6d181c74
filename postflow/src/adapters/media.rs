//! Media generation contracts: narration audio, images and short-form video.
//!
//! Media processing happens in external collaborators. This module only
//! defines the requests they accept and the file descriptors they return,
//! plus the per-platform delivery constraints videos must satisfy.

use crate::contracts::{FieldSpec, FieldType, Schema};
use crate::errors::AdapterError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Narration language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Japanese.
    #[default]
    Japanese,
    /// English.
    English,
}

impl Language {
    /// Returns the ISO 639-1 code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Japanese => "ja",
            Self::English => "en",
        }
    }
}

/// Default voice settings per language.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoicePreset {
    /// Provider voice ID.
    pub voice_id: &'static str,
    /// Display name.
    pub voice_name: &'static str,
    /// Voice stability, 0-1.
    pub stability: f64,
    /// Similarity boost, 0-1.
    pub similarity_boost: f64,
}

impl VoicePreset {
    /// Returns the preset for a language.
    #[must_use]
    pub const fn for_language(language: Language) -> Self {
        match language {
            Language::Japanese => Self {
                voice_id: "EXAVITQu4vr4xnSDxMaL",
                voice_name: "Antoni",
                stability: 0.3,
                similarity_boost: 0.8,
            },
            Language::English => Self {
                voice_id: "pNInz6obpgDQGcFmaJgB",
                voice_name: "Adam",
                stability: 0.5,
                similarity_boost: 0.75,
            },
        }
    }
}

/// Text-to-speech request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioRequest {
    /// Text to narrate.
    pub text: String,
    /// Provider voice ID.
    pub voice_id: String,
    /// Output file name; the provider picks one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Voice stability, 0-1.
    pub stability: f64,
    /// Similarity boost, 0-1.
    pub similarity_boost: f64,
}

impl AudioRequest {
    /// Creates a request using the language's voice preset.
    #[must_use]
    pub fn for_language(text: impl Into<String>, language: Language) -> Self {
        let preset = VoicePreset::for_language(language);
        Self {
            text: text.into(),
            voice_id: preset.voice_id.to_string(),
            file_name: None,
            stability: preset.stability,
            similarity_boost: preset.similarity_boost,
        }
    }

    /// Overrides the voice.
    #[must_use]
    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    /// Sets the output file name.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Input schema used when narration is exposed as a model tool.
    #[must_use]
    pub fn schema() -> Schema {
        Schema::new("generate_audio")
            .field(FieldSpec::string("text").required().with_min_length(1))
            .field(FieldSpec::string("voice_id").with_default(VoicePreset::for_language(Language::English).voice_id))
            .field(FieldSpec::string("file_name"))
            .field(FieldSpec::number("stability").between(0.0, 1.0).with_default(0.5))
            .field(FieldSpec::number("similarity_boost").between(0.0, 1.0).with_default(0.75))
    }
}

/// Post-processing applied to generated narration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioEnhanceRequest {
    /// File to enhance.
    pub input_path: String,
    /// Output file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file_name: Option<String>,
    /// Remove background noise.
    pub remove_background: bool,
    /// Normalize loudness.
    pub normalize: bool,
    /// Boost speech clarity.
    pub increase_clarity: bool,
}

impl AudioEnhanceRequest {
    /// Creates a request with background removal and normalization on.
    #[must_use]
    pub fn new(input_path: impl Into<String>) -> Self {
        Self {
            input_path: input_path.into(),
            output_file_name: None,
            remove_background: true,
            normalize: true,
            increase_clarity: false,
        }
    }
}

/// A voice offered by the narration provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Provider voice ID.
    pub voice_id: String,
    /// Display name.
    pub name: String,
}

/// A generated or processed media file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    /// Local path of the file.
    pub file_path: String,
    /// Size in bytes.
    pub file_size: u64,
    /// Size before processing, for optimize/enhance operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_size: Option<u64>,
    /// Duration for audio and video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Pixel width for images and video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Pixel height for images and video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Container format, e.g. `mp3`, `mp4`, `jpg`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl MediaFile {
    /// Creates a descriptor with only path and size.
    #[must_use]
    pub fn new(file_path: impl Into<String>, file_size: u64) -> Self {
        Self {
            file_path: file_path.into(),
            file_size,
            original_size: None,
            duration_ms: None,
            width: None,
            height: None,
            format: None,
        }
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Sets the resolution.
    #[must_use]
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Sets the format.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Sets the pre-processing size.
    #[must_use]
    pub fn with_original_size(mut self, size: u64) -> Self {
        self.original_size = Some(size);
        self
    }

    /// Returns `original / current`, when the original size is known.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compression_ratio(&self) -> Option<f64> {
        match self.original_size {
            Some(original) if self.file_size > 0 => Some(original as f64 / self.file_size as f64),
            _ => None,
        }
    }
}

/// Narration generation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioGenerator: Send + Sync {
    /// Synthesizes speech.
    async fn generate_audio(&self, request: &AudioRequest) -> Result<MediaFile, AdapterError>;

    /// Cleans up a narration file.
    async fn enhance_audio(&self, request: &AudioEnhanceRequest) -> Result<MediaFile, AdapterError>;

    /// Lists the available voices.
    async fn list_voices(&self) -> Result<Vec<Voice>, AdapterError>;
}

/// Stock image search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSearchRequest {
    /// Search keyword.
    pub keyword: String,
    /// Maximum candidates.
    pub limit: u32,
}

impl ImageSearchRequest {
    /// Input schema used when image search is exposed as a model tool.
    #[must_use]
    pub fn schema() -> Schema {
        Schema::new("search_images")
            .field(
                FieldSpec::string("keyword")
                    .required()
                    .with_min_length(1)
                    .with_description("What the image should show"),
            )
            .field(FieldSpec::integer("limit").between(1.0, 10.0).with_default(3))
    }
}

/// A candidate image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCandidate {
    /// Image URL.
    pub url: String,
    /// Short description.
    #[serde(default)]
    pub title: String,
    /// Photographer or site credit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit: Option<String>,
}

/// Resize/recompress request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOptimizeRequest {
    /// Source image URL or path.
    pub image_url: String,
    /// Output file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Target width; height keeps the aspect ratio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// JPEG quality, 1-100.
    pub quality: u8,
}

impl ImageOptimizeRequest {
    /// Creates a request at quality 80.
    #[must_use]
    pub fn new(image_url: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            file_name: None,
            width: None,
            quality: 80,
        }
    }

    /// Input schema used when image optimization is exposed as a model tool.
    #[must_use]
    pub fn schema() -> Schema {
        Schema::new("optimize_image")
            .field(FieldSpec::string("image_url").required().with_description("Image to download"))
            .field(FieldSpec::string("file_name"))
            .field(FieldSpec::integer("width").between(16.0, 4096.0))
            .field(FieldSpec::integer("quality").between(1.0, 100.0).with_default(80))
    }
}

/// Image search and optimization.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageProcessor: Send + Sync {
    /// Finds candidate images.
    async fn search_images(&self, request: &ImageSearchRequest) -> Result<Vec<ImageCandidate>, AdapterError>;

    /// Downloads and recompresses an image.
    async fn optimize_image(&self, request: &ImageOptimizeRequest) -> Result<MediaFile, AdapterError>;
}

/// Target short-form video platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Instagram Reels.
    #[default]
    InstagramReel,
    /// TikTok.
    Tiktok,
    /// Square Instagram feed post.
    InstagramPost,
}

/// Delivery constraints of a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlatformSpec {
    /// Aspect ratio, e.g. `9:16`.
    pub aspect_ratio: &'static str,
    /// Frame width.
    pub width: u32,
    /// Frame height.
    pub height: u32,
    /// Longest accepted video.
    pub max_duration_secs: u32,
    /// Container format.
    pub format: &'static str,
    /// Video codec.
    pub codec: &'static str,
    /// Largest accepted upload.
    pub max_file_size_mb: u32,
}

impl Platform {
    /// Returns the platform's delivery constraints.
    #[must_use]
    pub const fn spec(self) -> PlatformSpec {
        match self {
            Self::InstagramReel => PlatformSpec {
                aspect_ratio: "9:16",
                width: 1080,
                height: 1920,
                max_duration_secs: 90,
                format: "mp4",
                codec: "h264",
                max_file_size_mb: 4000,
            },
            Self::Tiktok => PlatformSpec {
                aspect_ratio: "9:16",
                width: 1080,
                height: 1920,
                max_duration_secs: 180,
                format: "mp4",
                codec: "h264",
                max_file_size_mb: 500,
            },
            Self::InstagramPost => PlatformSpec {
                aspect_ratio: "1:1",
                width: 1080,
                height: 1080,
                max_duration_secs: 60,
                format: "mp4",
                codec: "h264",
                max_file_size_mb: 4000,
            },
        }
    }

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InstagramReel => "instagram_reel",
            Self::Tiktok => "tiktok",
            Self::InstagramPost => "instagram_post",
        }
    }

    /// Clamps a requested duration to the platform maximum.
    #[must_use]
    pub fn clamp_duration(self, duration_secs: f64) -> f64 {
        duration_secs.clamp(1.0, f64::from(self.spec().max_duration_secs))
    }
}

/// Transition between slideshow images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// Cross-fade.
    #[default]
    Fade,
    /// Slide.
    Slide,
    /// Zoom.
    Zoom,
    /// Hard cut.
    None,
}

/// Slideshow video request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRequest {
    /// Images shown in order.
    pub images_paths: Vec<String>,
    /// Soundtrack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<String>,
    /// Output file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file_name: Option<String>,
    /// Target platform.
    pub platform: Platform,
    /// Length in seconds.
    pub duration_secs: f64,
    /// Transition effect.
    pub transition: Transition,
    /// Watermark text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<String>,
    /// Burned-in caption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl VideoRequest {
    /// Input schema used when video creation is exposed as a model tool.
    #[must_use]
    pub fn schema() -> Schema {
        Schema::new("create_video")
            .field(FieldSpec::array("images_paths", FieldType::String).required().with_min_length(1))
            .field(FieldSpec::string("audio_path"))
            .field(FieldSpec::string("output_file_name"))
            .field(
                FieldSpec::string("platform")
                    .one_of(&["instagram_reel", "tiktok", "instagram_post"])
                    .with_default("instagram_reel"),
            )
            .field(FieldSpec::number("duration_secs").between(1.0, 180.0).with_default(30))
            .field(
                FieldSpec::string("transition")
                    .one_of(&["fade", "slide", "zoom", "none"])
                    .with_default("fade"),
            )
            .field(FieldSpec::string("watermark"))
            .field(FieldSpec::string("caption"))
    }
}

/// Where an overlay is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverlayPosition {
    /// Top of the frame.
    Top,
    /// Centre of the frame.
    Center,
    /// Bottom of the frame.
    #[default]
    Bottom,
}

/// Timed text drawn over a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    /// Text to draw.
    pub text: String,
    /// Start time in seconds.
    pub start_time: f64,
    /// End time in seconds.
    pub end_time: f64,
    /// Placement.
    #[serde(default)]
    pub position: OverlayPosition,
    /// Font size in points.
    pub font_size: u32,
    /// Font colour.
    pub font_color: String,
    /// Box colour behind the text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

impl TextOverlay {
    /// Creates a white, 24pt, bottom-aligned overlay.
    #[must_use]
    pub fn new(text: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        Self {
            text: text.into(),
            start_time,
            end_time,
            position: OverlayPosition::Bottom,
            font_size: 24,
            font_color: "white".to_string(),
            background_color: None,
        }
    }

    /// Sets the position.
    #[must_use]
    pub fn at(mut self, position: OverlayPosition) -> Self {
        self.position = position;
        self
    }
}

/// Overlay request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayRequest {
    /// Video to draw on.
    pub video_path: String,
    /// Output file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file_name: Option<String>,
    /// Overlays to draw.
    pub overlays: Vec<TextOverlay>,
}

/// Encoding quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoQuality {
    /// Smallest file.
    Low,
    /// Balanced.
    Medium,
    /// Best picture.
    #[default]
    High,
}

impl VideoQuality {
    /// Fraction of the platform's maximum bitrate to target.
    #[must_use]
    pub const fn bitrate_factor(self) -> f64 {
        match self {
            Self::Low => 0.4,
            Self::Medium => 0.6,
            Self::High => 0.8,
        }
    }
}

/// Platform optimization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoOptimizeRequest {
    /// Video to optimize.
    pub video_path: String,
    /// Target platform.
    pub platform: Platform,
    /// Quality preset.
    pub quality: VideoQuality,
    /// Prepend an intro card.
    pub add_intro: bool,
    /// Append an outro card.
    pub add_outro: bool,
}

/// Subtitle file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptionFormat {
    /// SubRip.
    #[default]
    Srt,
    /// WebVTT.
    Vtt,
    /// Advanced SubStation Alpha.
    Ass,
}

/// Caption generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionRequest {
    /// Video to caption.
    pub video_path: String,
    /// Spoken language.
    pub language: Language,
    /// Output format.
    pub format: CaptionFormat,
    /// Output file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file_name: Option<String>,
}

/// A generated subtitle file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionFile {
    /// Local path.
    pub file_path: String,
    /// Number of captioned words.
    pub word_count: u64,
    /// Covered duration in seconds.
    pub duration_secs: f64,
    /// Caption language.
    pub language: Language,
    /// File format.
    pub format: CaptionFormat,
}

/// Video composition and finishing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoComposer: Send + Sync {
    /// Builds a slideshow video.
    async fn create_video(&self, request: &VideoRequest) -> Result<MediaFile, AdapterError>;

    /// Draws timed text over a video.
    async fn add_text_overlay(&self, request: &OverlayRequest) -> Result<MediaFile, AdapterError>;

    /// Re-encodes for a platform.
    async fn optimize_video(&self, request: &VideoOptimizeRequest) -> Result<MediaFile, AdapterError>;

    /// Produces a subtitle file.
    async fn generate_captions(&self, request: &CaptionRequest) -> Result<CaptionFile, AdapterError>;
}
