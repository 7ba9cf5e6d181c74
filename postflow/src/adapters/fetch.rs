//! URL fetch and HTML extraction contract.

use crate::contracts::{FieldSpec, Schema};
use crate::errors::AdapterError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A page to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Absolute URL.
    pub url: String,
    /// CSS selector restricting the extracted text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Whether to collect image URLs.
    #[serde(default)]
    pub extract_images: bool,
    /// Whether to collect links.
    #[serde(default)]
    pub extract_links: bool,
}

impl FetchRequest {
    /// Creates a text-only request.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            selector: None,
            extract_images: false,
            extract_links: false,
        }
    }

    /// Restricts extraction to `selector`.
    #[must_use]
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Also collects images.
    #[must_use]
    pub fn with_images(mut self) -> Self {
        self.extract_images = true;
        self
    }

    /// Also collects links.
    #[must_use]
    pub fn with_links(mut self) -> Self {
        self.extract_links = true;
        self
    }

    /// Input schema used when fetch is exposed as a model tool.
    #[must_use]
    pub fn schema() -> Schema {
        Schema::new("fetch_url")
            .field(FieldSpec::string("url").required().with_description("URL to fetch"))
            .field(FieldSpec::string("selector").with_description("CSS selector for the content"))
            .field(
                FieldSpec::boolean("extract_images")
                    .with_default(false)
                    .with_description("Collect image URLs"),
            )
            .field(
                FieldSpec::boolean("extract_links")
                    .with_default(false)
                    .with_description("Collect links"),
            )
    }
}

/// A hyperlink found on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    /// Absolute target URL.
    pub url: String,
    /// Link text.
    pub text: String,
}

/// Text and metadata extracted from a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedPage {
    /// The fetched URL.
    pub url: String,
    /// `<title>`, falling back to `og:title`.
    pub title: String,
    /// Meta description, falling back to `og:description`.
    pub description: String,
    /// Main text content with whitespace collapsed.
    pub content: String,
    /// All `<meta name|property=... content=...>` pairs.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Absolute image URLs, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    /// Links, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<PageLink>>,
}

/// Fetches a URL and extracts its readable content.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FetchAdapter: Send + Sync {
    /// Fetches and extracts one page.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::FetchFailed`] on network, status or parse
    /// failures.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedPage, AdapterError>;
}
