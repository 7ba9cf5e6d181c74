//! CMS publishing contract.
//!
//! Publishing is upsert-like: a request carrying the identifier of an
//! existing post updates that post and returns the same identifier, so a
//! caller that retries a publish never creates a duplicate.

use crate::errors::AdapterError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Visibility of a published post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Saved but not visible.
    #[default]
    Draft,
    /// Awaiting review.
    Pending,
    /// Visible to logged-in editors only.
    Private,
    /// Publicly visible.
    Publish,
}

impl PostStatus {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Private => "private",
            Self::Publish => "publish",
        }
    }
}

/// A category on a publish target or in the datastore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Target-specific identifier.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// URL slug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl Category {
    /// Creates a category.
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            slug: None,
        }
    }
}

/// Picks the first preferred category that exists on the target.
///
/// # Errors
///
/// Returns [`AdapterError::CategoryInvalid`] when none of `preferred` is
/// available.
pub fn choose_category<'a>(
    target: &str,
    available: &'a [Category],
    preferred: &[u64],
) -> Result<&'a Category, AdapterError> {
    preferred
        .iter()
        .find_map(|id| available.iter().find(|c| c.id == *id))
        .ok_or_else(|| {
            let wanted: Vec<String> = preferred.iter().map(ToString::to_string).collect();
            AdapterError::category_invalid(target, wanted.join("|"))
        })
}

/// The fields of an article to store or publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Title.
    pub title: String,
    /// Body, markdown or HTML.
    pub content: String,
    /// Meta description / excerpt.
    #[serde(default)]
    pub excerpt: String,
    /// SEO keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// URL slug.
    pub slug: String,
    /// Target category.
    pub category_id: u64,
    /// Requested visibility.
    #[serde(default)]
    pub status: PostStatus,
}

/// Upsert request for the CMS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    /// The article.
    pub article: Article,
    /// Existing post to update instead of creating a new one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_id: Option<u64>,
}

/// A post as reported by the CMS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPost {
    /// Stable post identifier.
    pub id: u64,
    /// Public or preview URL.
    pub url: String,
    /// Current status.
    pub status: PostStatus,
}

/// A media file to upload to the CMS library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaUpload {
    /// Local file to upload.
    pub file_path: String,
    /// Media title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Caption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Alt text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

/// An uploaded media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedMedia {
    /// Media identifier.
    pub id: u64,
    /// Public URL.
    pub url: String,
}

/// A CMS publish endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PublishAdapter: Send + Sync {
    /// Lists the target's categories.
    async fn categories(&self) -> Result<Vec<Category>, AdapterError>;

    /// Creates or updates a post.
    ///
    /// # Errors
    ///
    /// [`AdapterError::CategoryInvalid`] for an unknown category,
    /// [`AdapterError::PublishFailed`] otherwise.
    async fn publish(&self, request: &PublishRequest) -> Result<PublishedPost, AdapterError>;

    /// Uploads a file to the media library.
    async fn upload_media(&self, upload: &MediaUpload) -> Result<UploadedMedia, AdapterError>;

    /// Associates a media item as a post's featured image.
    async fn set_featured_media(&self, post_id: u64, media_id: u64) -> Result<(), AdapterError>;
}
