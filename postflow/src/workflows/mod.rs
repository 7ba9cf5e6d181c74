//! Ready-made content workflows.
//!
//! - [`blog`]: plan, write and edit a post with three agents
//! - [`publish`]: the blog workflow followed by a datastore save and CMS publish
//! - [`image`]: find, optimize and upload images for a post
//! - [`audio`]: narration with optional enhancement
//! - [`video`]: short-form video for Reels and TikTok
//!
//! Stages hand each other typed records; each workflow module exports the
//! record types so callers can read a finished run with
//! [`StageResult::parse`].

pub mod audio;
pub mod blog;
pub mod image;
pub mod publish;
pub mod video;

use crate::context::StageContext;
use crate::contracts::IntoStageResult;
use crate::core::StageResult;
use crate::errors::PostflowError;

pub(crate) fn committed(output: impl IntoStageResult) -> Result<StageResult, PostflowError> {
    Ok(output.into_stage_result()?)
}

/// Short run tag for naming generated files.
pub(crate) fn run_tag(ctx: &StageContext<'_>) -> String {
    let mut tag = ctx.identity().run_id.simple().to_string();
    tag.truncate(8);
    tag
}
