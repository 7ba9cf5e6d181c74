//! HTTP page fetcher with HTML text extraction.

use super::{build_client, describe_failure, describe_transport};
use crate::adapters::fetch::{FetchAdapter, FetchRequest, FetchedPage, PageLink};
use crate::config::FetchSettings;
use crate::errors::{AdapterError, ConfigError};
use crate::utils::truncate_chars;
use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

/// Tags whose text is never part of the readable content.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "nav", "header", "footer", "aside", "form",
];

/// Class or id words that mark boilerplate containers.
const SKIPPED_MARKERS: &[&str] = &[
    "sidebar", "ad", "ads", "advert", "advertisement", "banner", "cookie", "comments",
];

/// Containers tried in order when no selector is given.
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    ".content",
    "#content",
    ".post",
    ".entry-content",
    ".article",
];

/// Fetches pages over HTTP and extracts their readable text.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: Client,
    max_content_chars: usize,
}

impl HttpFetcher {
    /// Creates a fetcher.
    pub fn new(settings: &FetchSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            http: build_client(settings.timeout(), Some(&settings.user_agent))?,
            max_content_chars: settings.max_content_chars,
        })
    }
}

#[async_trait]
impl FetchAdapter for HttpFetcher {
    #[instrument(skip(self), fields(url = %request.url))]
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedPage, AdapterError> {
        let url = Url::parse(&request.url)
            .map_err(|e| AdapterError::fetch_failed(&request.url, format!("invalid URL: {e}")))?;

        let response = self
            .http
            .get(url.clone())
            .header("Accept", "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(|e| AdapterError::fetch_failed(&request.url, describe_transport(&e)))?;

        if !response.status().is_success() {
            return Err(AdapterError::fetch_failed(
                &request.url,
                describe_failure(response).await,
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AdapterError::fetch_failed(&request.url, e.to_string()))?;

        let page = extract_page(&url, &body, request, self.max_content_chars)?;
        debug!(chars = page.content.len(), "Fetched page");
        Ok(page)
    }
}

/// Extracts title, description, text, images and links from an HTML document.
///
/// # Errors
///
/// [`AdapterError::FetchFailed`] when the requested selector is invalid.
pub fn extract_page(
    base: &Url,
    html: &str,
    request: &FetchRequest,
    max_content_chars: usize,
) -> Result<FetchedPage, AdapterError> {
    let document = Html::parse_document(html);
    let metadata = collect_meta(&document);

    let title = first_text(&document, "title")
        .or_else(|| metadata.get("og:title").cloned())
        .unwrap_or_default();
    let description = metadata
        .get("description")
        .or_else(|| metadata.get("og:description"))
        .cloned()
        .unwrap_or_default();

    let root = match &request.selector {
        Some(selector) => {
            let parsed = Selector::parse(selector).map_err(|e| {
                AdapterError::fetch_failed(base.as_str(), format!("invalid selector '{selector}': {e}"))
            })?;
            document.select(&parsed).next()
        }
        None => CONTENT_SELECTORS
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .find_map(|s| document.select(&s).next()),
    };
    let root = root
        .or_else(|| {
            Selector::parse("body")
                .ok()
                .and_then(|s| document.select(&s).next())
        })
        .unwrap_or_else(|| document.root_element());

    let mut text = String::new();
    collect_text(root, &mut text);
    let content = truncate_chars(&collapse_whitespace(&text), max_content_chars).to_string();

    let images = request
        .extract_images
        .then(|| collect_images(&document, base));
    let links = request.extract_links.then(|| collect_links(&document, base));

    Ok(FetchedPage {
        url: base.to_string(),
        title: title.trim().to_string(),
        description,
        content,
        metadata,
        images,
        links,
    })
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>())
        .filter(|t| !t.trim().is_empty())
}

fn collect_meta(document: &Html) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    let Ok(selector) = Selector::parse("meta[content]") else {
        return metadata;
    };
    for el in document.select(&selector) {
        let element = el.value();
        let key = element.attr("name").or_else(|| element.attr("property"));
        if let (Some(key), Some(content)) = (key, element.attr("content")) {
            metadata
                .entry(key.to_ascii_lowercase())
                .or_insert_with(|| content.trim().to_string());
        }
    }
    metadata
}

fn is_boilerplate(el: &ElementRef<'_>) -> bool {
    let element = el.value();
    if SKIPPED_TAGS.contains(&element.name()) {
        return true;
    }
    let marked = |value: &str| {
        value
            .split(['-', '_'])
            .any(|word| SKIPPED_MARKERS.contains(&word.to_ascii_lowercase().as_str()))
    };
    element.classes().any(marked) || element.id().is_some_and(marked)
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !is_boilerplate(&child_el) {
                collect_text(child_el, out);
            }
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}

fn collect_images(document: &Html, base: &Url) -> Vec<String> {
    let Ok(selector) = Selector::parse("img[src]") else {
        return Vec::new();
    };
    let mut seen = BTreeSet::new();
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("src"))
        .filter(|src| !src.starts_with("data:"))
        .filter_map(|src| resolve(base, src))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

fn collect_links(document: &Html, base: &Url) -> Vec<PageLink> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|el| {
            let url = resolve(base, el.value().attr("href")?)?;
            let text = collapse_whitespace(&el.text().collect::<String>());
            Some(PageLink { url, text })
        })
        .collect()
}
