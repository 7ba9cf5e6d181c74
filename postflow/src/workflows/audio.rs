//! Narration workflow: synthesize speech, then clean it up.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use super::{committed, run_tag};
use crate::adapters::{AudioEnhanceRequest, AudioGenerator, AudioRequest, Language, MediaFile};
use crate::context::StageContext;
use crate::contracts::{FieldSpec, Schema};
use crate::core::StageResult;
use crate::errors::{PipelineDefinitionError, PostflowError};
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::stages::Stage;

/// Pipeline name.
pub const AUDIO_PIPELINE: &str = "narration-audio";
/// Synthesis stage.
pub const GENERATE_STAGE: &str = "generate_audio";
/// Enhancement stage; its `audio` field is the file to use.
pub const ENHANCE_STAGE: &str = "enhance_audio";

/// Trigger schema of the audio workflow.
#[must_use]
pub fn trigger_schema() -> Schema {
    Schema::new("audio_trigger")
        .field(FieldSpec::string("text").required().with_min_length(1))
        .field(
            FieldSpec::string("language")
                .one_of(&["japanese", "english"])
                .with_default("japanese"),
        )
        .field(FieldSpec::string("voiceId"))
        .field(FieldSpec::string("outputFileName"))
        .field(FieldSpec::boolean("enhanceAudio").with_default(true))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioTrigger {
    text: String,
    language: Language,
    #[serde(default)]
    voice_id: Option<String>,
    #[serde(default)]
    output_file_name: Option<String>,
    enhance_audio: bool,
}

/// Synthesized narration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationOutput {
    /// The generated file.
    pub audio: MediaFile,
    /// Narration language.
    pub language: Language,
    /// Voice used.
    pub voice_id: String,
}

/// Outcome of the enhancement step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancementOutput {
    /// The file to use: enhanced when enhancement succeeded, else original.
    pub audio: MediaFile,
    /// The synthesized file.
    pub original: MediaFile,
    /// Whether `audio` is the enhanced file.
    pub enhanced: bool,
    /// Enhancement was turned off by the trigger.
    pub skipped: bool,
    /// Why enhancement failed, when it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhancement_error: Option<String>,
}

/// Adds `.mp3` unless the name already has an extension.
pub(crate) fn audio_file_name(name: &str) -> String {
    if std::path::Path::new(name).extension().is_some() {
        name.to_string()
    } else {
        format!("{name}.mp3")
    }
}

/// Synthesizes narration from text.
pub struct NarrationStage {
    audio: Arc<dyn AudioGenerator>,
}

impl NarrationStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(audio: Arc<dyn AudioGenerator>) -> Self {
        Self { audio }
    }
}

impl fmt::Debug for NarrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NarrationStage").finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for NarrationStage {
    fn name(&self) -> &str {
        GENERATE_STAGE
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageResult, PostflowError> {
        let trigger: AudioTrigger = ctx.trigger().parse()?;
        let file_name = trigger
            .output_file_name
            .as_deref()
            .map_or_else(|| format!("audio_{}.mp3", run_tag(ctx)), audio_file_name);

        let mut request = AudioRequest::for_language(trigger.text, trigger.language).with_file_name(file_name);
        if let Some(voice) = trigger.voice_id {
            request = request.with_voice(voice);
        }

        let audio = self.audio.generate_audio(&request).await?;
        committed(NarrationOutput {
            audio,
            language: trigger.language,
            voice_id: request.voice_id,
        })
    }
}

/// Removes noise and normalizes the narration.
///
/// A failed enhancement keeps the original file and records the error; the
/// run continues.
pub struct EnhanceStage {
    audio: Arc<dyn AudioGenerator>,
}

impl EnhanceStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(audio: Arc<dyn AudioGenerator>) -> Self {
        Self { audio }
    }
}

impl fmt::Debug for EnhanceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnhanceStage").finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for EnhanceStage {
    fn name(&self) -> &str {
        ENHANCE_STAGE
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageResult, PostflowError> {
        let trigger: AudioTrigger = ctx.trigger().parse()?;
        let narration: NarrationOutput = ctx.inputs().result(GENERATE_STAGE)?.parse()?;
        let original = narration.audio;

        if !trigger.enhance_audio {
            return committed(EnhancementOutput {
                audio: original.clone(),
                original,
                enhanced: false,
                skipped: true,
                enhancement_error: None,
            });
        }

        let mut request = AudioEnhanceRequest::new(&original.file_path);
        request.increase_clarity = true;

        match self.audio.enhance_audio(&request).await {
            Ok(enhanced) => committed(EnhancementOutput {
                audio: enhanced,
                original,
                enhanced: true,
                skipped: false,
                enhancement_error: None,
            }),
            Err(error) => {
                warn!(file = %original.file_path, error = %error, "Enhancement failed, keeping original");
                Ok(committed(EnhancementOutput {
                    audio: original.clone(),
                    original,
                    enhanced: false,
                    skipped: false,
                    enhancement_error: Some(error.to_string()),
                })?
                .with_metadata("degraded", true))
            }
        }
    }
}

/// Builds the audio pipeline.
pub fn pipeline(audio: Arc<dyn AudioGenerator>) -> Result<Pipeline, PipelineDefinitionError> {
    PipelineBuilder::new(AUDIO_PIPELINE)
        .input_schema(trigger_schema())
        .stage(Arc::new(NarrationStage::new(audio.clone())))
        .stage(Arc::new(EnhanceStage::new(audio)))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::VoicePreset;
    use crate::testing::FakeAudio;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_generates_and_enhances() {
        let audio = Arc::new(FakeAudio::new());
        let run = pipeline(audio.clone())
            .unwrap()
            .execute(&json!({"text": "Welcome aboard", "outputFileName": "welcome"}))
            .await;

        assert!(run.is_completed());
        let generated = audio.generated();
        assert_eq!(generated[0].file_name.as_deref(), Some("welcome.mp3"));
        assert_eq!(generated[0].voice_id, VoicePreset::for_language(Language::Japanese).voice_id);

        let output: EnhancementOutput = run.result(ENHANCE_STAGE).unwrap().parse().unwrap();
        assert!(output.enhanced);
        assert_eq!(output.audio.file_path, "output/welcome_enhanced.mp3");
        assert_eq!(audio.enhanced()[0].input_path, "output/welcome.mp3");
    }

    #[tokio::test]
    async fn test_skip_enhancement() {
        let audio = Arc::new(FakeAudio::new());
        let run = pipeline(audio.clone())
            .unwrap()
            .execute(&json!({
                "text": "Hello",
                "language": "english",
                "voiceId": "custom-voice",
                "enhanceAudio": false,
            }))
            .await;

        assert!(run.is_completed());
        assert_eq!(audio.generated()[0].voice_id, "custom-voice");
        assert!(audio.enhanced().is_empty());
        assert_eq!(run.final_value(ENHANCE_STAGE, "skipped"), Some(&json!(true)));
        assert_eq!(run.final_value(GENERATE_STAGE, "language"), Some(&json!("english")));
    }

    #[tokio::test]
    async fn test_enhancement_failure_keeps_original() {
        let audio = Arc::new(FakeAudio::new().failing_enhance());
        let run = pipeline(audio).unwrap().execute(&json!({"text": "Hello"})).await;

        assert!(run.is_completed());
        let result = run.result(ENHANCE_STAGE).unwrap();
        let output: EnhancementOutput = result.parse().unwrap();
        assert!(!output.enhanced);
        assert_eq!(output.audio, output.original);
        assert!(output.enhancement_error.unwrap().contains("enhancer unavailable"));
        assert_eq!(result.metadata("degraded"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_rejects_unknown_language() {
        let run = pipeline(Arc::new(FakeAudio::new()))
            .unwrap()
            .execute(&json!({"text": "Hola", "language": "spanish"}))
            .await;
        assert_eq!(run.error().and_then(PostflowError::as_validation).unwrap().field, "language");
    }

    #[test]
    fn test_audio_file_name() {
        assert_eq!(audio_file_name("intro"), "intro.mp3");
        assert_eq!(audio_file_name("intro.wav"), "intro.wav");
    }
}
