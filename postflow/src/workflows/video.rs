//! Short-form video workflow: narration, slideshow, overlays, platform cut.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use super::audio::{audio_file_name, NarrationOutput};
use super::{committed, run_tag};
use crate::adapters::{
    AudioGenerator, AudioRequest, CaptionFile, CaptionFormat, CaptionRequest, Language, MediaFile,
    OverlayPosition, OverlayRequest, Platform, TextOverlay, Transition, VideoComposer, VideoOptimizeRequest,
    VideoQuality, VideoRequest,
};
use crate::context::StageContext;
use crate::contracts::{FieldSpec, FieldType, Schema};
use crate::core::StageResult;
use crate::errors::{PipelineDefinitionError, PostflowError};
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::stages::Stage;

/// Pipeline name.
pub const VIDEO_PIPELINE: &str = "short-video";
/// Narration stage.
pub const NARRATION_STAGE: &str = "video_narration";
/// Slideshow stage.
pub const CREATE_STAGE: &str = "create_video";
/// Overlay stage.
pub const OVERLAY_STAGE: &str = "text_overlay";
/// Final stage; its `final_video_path` is the deliverable.
pub const FINALIZE_STAGE: &str = "finalize_video";

/// Overlay shown mid-video.
pub const SAFETY_MESSAGE: &str = "Safety comes first";
/// Overlay shown over the last seconds.
pub const CLOSING_MESSAGE: &str = "Learn more on our website";

const TITLE_SECS: f64 = 3.0;

/// Trigger schema of the video workflow.
#[must_use]
pub fn trigger_schema() -> Schema {
    Schema::new("video_trigger")
        .field(FieldSpec::array("imagesPaths", FieldType::String).required().with_min_length(1))
        .field(FieldSpec::string("scriptText").required().with_min_length(1))
        .field(
            FieldSpec::string("platform")
                .one_of(&["instagram_reel", "tiktok"])
                .with_default("instagram_reel"),
        )
        .field(FieldSpec::number("duration").between(1.0, 180.0).with_default(30))
        .field(FieldSpec::string("title").required().with_min_length(1))
        .field(FieldSpec::boolean("addCaptions").with_default(true))
        .field(
            FieldSpec::string("language")
                .one_of(&["japanese", "english"])
                .with_default("japanese"),
        )
        .field(FieldSpec::string("outputFileName").with_description("Stem of the generated files"))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoTrigger {
    images_paths: Vec<String>,
    script_text: String,
    platform: Platform,
    duration: f64,
    title: String,
    add_captions: bool,
    language: Language,
    #[serde(default)]
    output_file_name: Option<String>,
}

impl VideoTrigger {
    fn read(ctx: &StageContext<'_>) -> Result<Self, PostflowError> {
        Ok(ctx.trigger().parse()?)
    }

    fn stem(&self, ctx: &StageContext<'_>) -> String {
        self.output_file_name
            .clone()
            .unwrap_or_else(|| format!("video_{}_{}", self.platform.as_str(), run_tag(ctx)))
    }
}

/// The slideshow before overlays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoClipOutput {
    /// Rendered file.
    pub video: MediaFile,
    /// Target platform.
    pub platform: Platform,
    /// Length after clamping to the platform maximum.
    pub duration_secs: f64,
}

/// The video with overlays drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayOutput {
    /// Rendered file.
    pub video: MediaFile,
    /// Overlays drawn.
    pub overlays: Vec<TextOverlay>,
}

/// The deliverable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalVideoOutput {
    /// Path of the platform-ready file.
    pub final_video_path: String,
    /// The platform-ready file.
    pub video: MediaFile,
    /// Target platform.
    pub platform: Platform,
    /// Subtitles, when generated.
    pub captions: Option<CaptionFile>,
    /// Captions were turned off by the trigger.
    pub captions_skipped: bool,
}

/// Title at the top, the safety message mid-way, the closing line at the end.
fn overlays_for(title: &str, duration_secs: f64) -> Vec<TextOverlay> {
    let middle = duration_secs / 2.0;
    vec![
        TextOverlay::new(title, 0.0, TITLE_SECS.min(duration_secs)).at(OverlayPosition::Top),
        TextOverlay::new(SAFETY_MESSAGE, (middle - 1.5).max(0.0), (middle + 1.5).min(duration_secs))
            .at(OverlayPosition::Center),
        TextOverlay::new(CLOSING_MESSAGE, (duration_secs - TITLE_SECS).max(0.0), duration_secs)
            .at(OverlayPosition::Bottom),
    ]
}

/// Narrates the script.
pub struct VideoNarrationStage {
    audio: Arc<dyn AudioGenerator>,
}

#[async_trait]
impl Stage for VideoNarrationStage {
    fn name(&self) -> &str {
        NARRATION_STAGE
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageResult, PostflowError> {
        let trigger = VideoTrigger::read(ctx)?;
        let request = AudioRequest::for_language(trigger.script_text.clone(), trigger.language)
            .with_file_name(audio_file_name(&format!("{}_audio", trigger.stem(ctx))));
        let audio = self.audio.generate_audio(&request).await?;

        committed(NarrationOutput {
            audio,
            language: trigger.language,
            voice_id: request.voice_id,
        })
    }
}

/// Renders the slideshow over the narration.
pub struct CreateVideoStage {
    video: Arc<dyn VideoComposer>,
}

#[async_trait]
impl Stage for CreateVideoStage {
    fn name(&self) -> &str {
        CREATE_STAGE
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageResult, PostflowError> {
        let trigger = VideoTrigger::read(ctx)?;
        let narration: NarrationOutput = ctx.inputs().result(NARRATION_STAGE)?.parse()?;

        let duration_secs = trigger.platform.clamp_duration(trigger.duration);
        if (duration_secs - trigger.duration).abs() > f64::EPSILON {
            warn!(
                requested = trigger.duration,
                clamped = duration_secs,
                platform = trigger.platform.as_str(),
                "Duration clamped to platform limit"
            );
        }

        let request = VideoRequest {
            images_paths: trigger.images_paths.clone(),
            audio_path: Some(narration.audio.file_path),
            output_file_name: Some(format!("{}_raw.mp4", trigger.stem(ctx))),
            platform: trigger.platform,
            duration_secs,
            transition: Transition::Fade,
            watermark: None,
            caption: None,
        };
        let video = self.video.create_video(&request).await?;

        committed(VideoClipOutput {
            video,
            platform: trigger.platform,
            duration_secs,
        })
    }
}

/// Draws the title, safety and closing overlays.
pub struct TextOverlayStage {
    video: Arc<dyn VideoComposer>,
}

#[async_trait]
impl Stage for TextOverlayStage {
    fn name(&self) -> &str {
        OVERLAY_STAGE
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageResult, PostflowError> {
        let trigger = VideoTrigger::read(ctx)?;
        let clip: VideoClipOutput = ctx.inputs().result(CREATE_STAGE)?.parse()?;

        let request = OverlayRequest {
            video_path: clip.video.file_path,
            output_file_name: Some(format!("{}_text.mp4", trigger.stem(ctx))),
            overlays: overlays_for(&trigger.title, clip.duration_secs),
        };
        let video = self.video.add_text_overlay(&request).await?;

        committed(OverlayOutput {
            video,
            overlays: request.overlays,
        })
    }
}

/// Encodes for the platform and optionally generates captions.
pub struct FinalizeVideoStage {
    video: Arc<dyn VideoComposer>,
}

#[async_trait]
impl Stage for FinalizeVideoStage {
    fn name(&self) -> &str {
        FINALIZE_STAGE
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageResult, PostflowError> {
        let trigger = VideoTrigger::read(ctx)?;
        let overlay: OverlayOutput = ctx.inputs().result(OVERLAY_STAGE)?.parse()?;

        let video = self
            .video
            .optimize_video(&VideoOptimizeRequest {
                video_path: overlay.video.file_path,
                platform: trigger.platform,
                quality: VideoQuality::High,
                add_intro: true,
                add_outro: true,
            })
            .await?;

        let captions = if trigger.add_captions {
            let request = CaptionRequest {
                video_path: video.file_path.clone(),
                language: trigger.language,
                format: CaptionFormat::Srt,
                output_file_name: Some(format!("{}.srt", trigger.stem(ctx))),
            };
            Some(self.video.generate_captions(&request).await?)
        } else {
            None
        };

        info!(path = %video.file_path, platform = trigger.platform.as_str(), "Video ready");
        committed(FinalVideoOutput {
            final_video_path: video.file_path.clone(),
            video,
            platform: trigger.platform,
            captions_skipped: captions.is_none(),
            captions,
        })
    }
}

impl fmt::Debug for VideoNarrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoNarrationStage").finish_non_exhaustive()
    }
}

impl fmt::Debug for CreateVideoStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateVideoStage").finish_non_exhaustive()
    }
}

impl fmt::Debug for TextOverlayStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextOverlayStage").finish_non_exhaustive()
    }
}

impl fmt::Debug for FinalizeVideoStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalizeVideoStage").finish_non_exhaustive()
    }
}

/// Builds the video pipeline.
pub fn pipeline(
    audio: Arc<dyn AudioGenerator>,
    video: Arc<dyn VideoComposer>,
) -> Result<Pipeline, PipelineDefinitionError> {
    PipelineBuilder::new(VIDEO_PIPELINE)
        .input_schema(trigger_schema())
        .stage(Arc::new(VideoNarrationStage { audio }))
        .stage(Arc::new(CreateVideoStage { video: video.clone() }))
        .stage(Arc::new(TextOverlayStage { video: video.clone() }))
        .stage(Arc::new(FinalizeVideoStage { video }))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAudio, FakeVideo};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn trigger() -> serde_json::Value {
        json!({
            "imagesPaths": ["a.jpg", "b.jpg", "c.jpg"],
            "scriptText": "We walk your child home every day.",
            "title": "Home Safe",
            "outputFileName": "home_safe",
        })
    }

    #[tokio::test]
    async fn test_full_video_run() {
        let audio = Arc::new(FakeAudio::new());
        let video = Arc::new(FakeVideo::new());
        let run = pipeline(audio.clone(), video.clone()).unwrap().execute(&trigger()).await;

        assert!(run.is_completed(), "{:?}", run.error());
        assert_eq!(
            video.calls(),
            vec!["create_video", "add_text_overlay", "optimize_video", "generate_captions"]
        );
        assert_eq!(audio.generated()[0].file_name.as_deref(), Some("home_safe_audio.mp3"));

        let clip: VideoClipOutput = run.result(CREATE_STAGE).unwrap().parse().unwrap();
        assert_eq!(clip.duration_secs, 30.0);
        assert_eq!(clip.video.file_path, "output/home_safe_raw.mp4");
        assert_eq!(clip.video.width, Some(1080));

        let output: FinalVideoOutput = run.result(FINALIZE_STAGE).unwrap().parse().unwrap();
        assert_eq!(output.final_video_path, "output/instagram_reel_optimized.mp4");
        assert_eq!(output.captions.unwrap().file_path, "output/home_safe.srt");
        assert!(!output.captions_skipped);
    }

    #[tokio::test]
    async fn test_captions_can_be_skipped() {
        let video = Arc::new(FakeVideo::new());
        let mut input = trigger();
        input["addCaptions"] = json!(false);
        input["platform"] = json!("tiktok");

        let run = pipeline(Arc::new(FakeAudio::new()), video.clone())
            .unwrap()
            .execute(&input)
            .await;

        assert!(run.is_completed());
        assert!(!video.calls().contains(&"generate_captions".to_string()));
        assert_eq!(run.final_value(FINALIZE_STAGE, "captions_skipped"), Some(&json!(true)));
        assert_eq!(run.final_value(FINALIZE_STAGE, "platform"), Some(&json!("tiktok")));
    }

    #[tokio::test]
    async fn test_duration_clamped_to_platform() {
        let mut input = trigger();
        input["duration"] = json!(150);

        let run = pipeline(Arc::new(FakeAudio::new()), Arc::new(FakeVideo::new()))
            .unwrap()
            .execute(&input)
            .await;

        let clip: VideoClipOutput = run.result(CREATE_STAGE).unwrap().parse().unwrap();
        assert_eq!(clip.duration_secs, 90.0);
        let overlay: OverlayOutput = run.result(OVERLAY_STAGE).unwrap().parse().unwrap();
        assert_eq!(overlay.overlays[2].start_time, 87.0);
    }

    #[tokio::test]
    async fn test_requires_images() {
        let mut input = trigger();
        input["imagesPaths"] = json!([]);
        let video = Arc::new(FakeVideo::new());

        let run = pipeline(Arc::new(FakeAudio::new()), video.clone())
            .unwrap()
            .execute(&input)
            .await;

        assert_eq!(run.error().and_then(PostflowError::as_validation).unwrap().field, "imagesPaths");
        assert!(video.calls().is_empty());
    }

    #[test]
    fn test_overlays_for_short_video() {
        let overlays = overlays_for("Hi", 2.0);
        assert_eq!(overlays[0].end_time, 2.0);
        assert_eq!(overlays[1].start_time, 0.0);
        assert_eq!(overlays[1].position, OverlayPosition::Center);
        assert_eq!(overlays[2].start_time, 0.0);
    }
}
