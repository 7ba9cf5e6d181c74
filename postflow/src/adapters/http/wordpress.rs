//! WordPress REST API publisher.

use super::{build_client, describe_failure, describe_transport};
use crate::adapters::publish::{
    Category, MediaUpload, PostStatus, PublishAdapter, PublishRequest, PublishedPost, UploadedMedia,
};
use crate::config::{require_secret, WordPressSettings};
use crate::errors::{AdapterError, ConfigError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::{debug, info, instrument};

const TARGET: &str = "wordpress";

/// Publishes posts and media through `/wp-json/wp/v2`.
#[derive(Debug, Clone)]
pub struct WordPressPublisher {
    http: Client,
    api_root: String,
    username: String,
    password: String,
}

impl WordPressPublisher {
    /// Creates a publisher.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Missing`] when the site URL, user or application
    /// password is absent.
    pub fn new(settings: &WordPressSettings) -> Result<Self, ConfigError> {
        if settings.base_url.is_empty() {
            return Err(ConfigError::Missing {
                key: "WORDPRESS_URL".to_string(),
            });
        }
        if settings.username.is_empty() {
            return Err(ConfigError::Missing {
                key: "WORDPRESS_USERNAME".to_string(),
            });
        }
        let password = require_secret(&settings.app_password, "WORDPRESS_APP_PASSWORD")?.to_string();
        Ok(Self {
            http: build_client(settings.timeout(), None)?,
            api_root: format!("{}/wp-json/wp/v2", settings.base_url.trim_end_matches('/')),
            username: settings.username.clone(),
            password,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_root, path.trim_start_matches('/'))
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(&self, path: &str, body: &Value) -> Result<T, AdapterError> {
        let response = self
            .http
            .post(self.url(path))
            .basic_auth(&self.username, Some(&self.password))
            .json(body)
            .send()
            .await
            .map_err(|e| AdapterError::publish_failed(TARGET, describe_transport(&e)))?;

        if response.status() == StatusCode::BAD_REQUEST {
            let text = response.text().await.unwrap_or_default();
            if text.contains("categories") {
                let category = body
                    .get("categories")
                    .and_then(|c| c.get(0))
                    .map_or_else(|| "unknown".to_string(), ToString::to_string);
                return Err(AdapterError::category_invalid(TARGET, category));
            }
            return Err(AdapterError::publish_failed(TARGET, format!("Invalid request: {text}")));
        }
        if !response.status().is_success() {
            return Err(AdapterError::publish_failed(TARGET, describe_failure(response).await));
        }

        response
            .json()
            .await
            .map_err(|e| AdapterError::publish_failed(TARGET, format!("malformed response: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct WpCategory {
    id: u64,
    name: String,
    #[serde(default)]
    slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WpPost {
    id: u64,
    #[serde(default)]
    link: String,
    #[serde(default)]
    status: Option<PostStatus>,
}

#[derive(Debug, Deserialize)]
struct WpMedia {
    id: u64,
    #[serde(default)]
    source_url: String,
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl PublishAdapter for WordPressPublisher {
    async fn categories(&self) -> Result<Vec<Category>, AdapterError> {
        let response = self
            .http
            .get(self.url("categories"))
            .basic_auth(&self.username, Some(&self.password))
            .query(&[("per_page", "100")])
            .send()
            .await
            .map_err(|e| AdapterError::publish_failed(TARGET, describe_transport(&e)))?;
        if !response.status().is_success() {
            return Err(AdapterError::publish_failed(TARGET, describe_failure(response).await));
        }
        let categories: Vec<WpCategory> = response
            .json()
            .await
            .map_err(|e| AdapterError::publish_failed(TARGET, format!("malformed response: {e}")))?;
        Ok(categories
            .into_iter()
            .map(|c| Category {
                id: c.id,
                name: c.name,
                slug: c.slug,
            })
            .collect())
    }

    #[instrument(skip(self, request), fields(slug = %request.article.slug, existing_id = ?request.existing_id))]
    async fn publish(&self, request: &PublishRequest) -> Result<PublishedPost, AdapterError> {
        let article = &request.article;
        let body = json!({
            "title": article.title,
            "content": article.content,
            "excerpt": article.excerpt,
            "slug": article.slug,
            "status": article.status.as_str(),
            "categories": [article.category_id],
        });
        let path = match request.existing_id {
            Some(id) => format!("posts/{id}"),
            None => "posts".to_string(),
        };

        let post: WpPost = self.post_json(&path, &body).await?;
        info!(post_id = post.id, "Published post");
        Ok(PublishedPost {
            id: post.id,
            url: post.link,
            status: post.status.unwrap_or(article.status),
        })
    }

    #[instrument(skip(self, upload), fields(file = %upload.file_path))]
    async fn upload_media(&self, upload: &MediaUpload) -> Result<UploadedMedia, AdapterError> {
        let path = Path::new(&upload.file_path);
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            AdapterError::publish_failed(TARGET, format!("cannot read {}: {e}", upload.file_path))
        })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();

        let response = self
            .http
            .post(self.url("media"))
            .basic_auth(&self.username, Some(&self.password))
            .header("Content-Type", content_type_for(path))
            .header("Content-Disposition", format!("attachment; filename=\"{file_name}\""))
            .body(bytes)
            .send()
            .await
            .map_err(|e| AdapterError::publish_failed(TARGET, describe_transport(&e)))?;
        if !response.status().is_success() {
            return Err(AdapterError::publish_failed(TARGET, describe_failure(response).await));
        }
        let media: WpMedia = response
            .json()
            .await
            .map_err(|e| AdapterError::publish_failed(TARGET, format!("malformed response: {e}")))?;

        if upload.title.is_some() || upload.caption.is_some() || upload.alt_text.is_some() {
            let mut details = serde_json::Map::new();
            if let Some(title) = &upload.title {
                details.insert("title".to_string(), json!(title));
            }
            if let Some(caption) = &upload.caption {
                details.insert("caption".to_string(), json!(caption));
            }
            if let Some(alt) = &upload.alt_text {
                details.insert("alt_text".to_string(), json!(alt));
            }
            let _: Value = self
                .post_json(&format!("media/{}", media.id), &Value::Object(details))
                .await?;
        }

        debug!(media_id = media.id, "Uploaded media");
        Ok(UploadedMedia {
            id: media.id,
            url: media.source_url,
        })
    }

    async fn set_featured_media(&self, post_id: u64, media_id: u64) -> Result<(), AdapterError> {
        let _: Value = self
            .post_json(&format!("posts/{post_id}"), &json!({"featured_media": media_id}))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::publish::Article;
    use crate::config::Secret;
    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn settings(base_url: String) -> WordPressSettings {
        WordPressSettings {
            base_url,
            username: "editor".to_string(),
            app_password: Secret::new("app pw"),
            ..WordPressSettings::default()
        }
    }

    fn article() -> Article {
        Article {
            title: "Safe pickups".to_string(),
            content: "<p>Body</p>".to_string(),
            excerpt: "meta".to_string(),
            keywords: vec![],
            slug: "safe-pickups".to_string(),
            category_id: 10,
            status: PostStatus::Draft,
        }
    }

    #[test]
    fn test_requires_credentials() {
        let err = WordPressPublisher::new(&WordPressSettings::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { ref key } if key == "WORDPRESS_URL"));
    }

    #[tokio::test]
    async fn test_categories() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/wp-json/wp/v2/categories")
                    .query_param("per_page", "100");
                then.status(200).json_body(serde_json::json!([
                    {"id": 1, "name": "Uncategorized", "slug": "uncategorized"},
                    {"id": 10, "name": "Escort service"}
                ]));
            })
            .await;

        let wp = WordPressPublisher::new(&settings(server.base_url())).unwrap();
        let categories = wp.categories().await.unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[1], Category::new(10, "Escort service"));
    }

    #[tokio::test]
    async fn test_publish_creates_then_updates() {
        let server = MockServer::start_async().await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/wp-json/wp/v2/posts")
                    .header_exists("authorization")
                    .json_body_partial(r#"{"slug": "safe-pickups", "categories": [10], "status": "draft"}"#);
                then.status(201).json_body(serde_json::json!({
                    "id": 77, "link": "https://blog.example/?p=77", "status": "draft"
                }));
            })
            .await;
        let update = server
            .mock_async(|when, then| {
                when.method(POST).path("/wp-json/wp/v2/posts/77");
                then.status(200).json_body(serde_json::json!({
                    "id": 77, "link": "https://blog.example/?p=77", "status": "draft"
                }));
            })
            .await;

        let wp = WordPressPublisher::new(&settings(server.base_url())).unwrap();
        let first = wp
            .publish(&PublishRequest {
                article: article(),
                existing_id: None,
            })
            .await
            .unwrap();
        let second = wp
            .publish(&PublishRequest {
                article: article(),
                existing_id: Some(first.id),
            })
            .await
            .unwrap();

        create.assert_async().await;
        update.assert_async().await;
        assert_eq!(first.id, 77);
        assert_eq!(second.id, first.id);
        assert_eq!(second.status, PostStatus::Draft);
    }

    #[tokio::test]
    async fn test_invalid_category() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/wp-json/wp/v2/posts");
                then.status(400).json_body(serde_json::json!({
                    "code": "rest_invalid_param",
                    "message": "Invalid parameter(s): categories"
                }));
            })
            .await;

        let wp = WordPressPublisher::new(&settings(server.base_url())).unwrap();
        let err = wp
            .publish(&PublishRequest {
                article: article(),
                existing_id: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err, AdapterError::category_invalid("wordpress", 10));
    }

    #[tokio::test]
    async fn test_server_error_is_publish_failed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/wp-json/wp/v2/posts");
                then.status(503);
            })
            .await;

        let wp = WordPressPublisher::new(&settings(server.base_url())).unwrap();
        let err = wp
            .publish(&PublishRequest {
                article: article(),
                existing_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::PublishFailed { ref target, .. } if target == "wordpress"));
    }

    #[tokio::test]
    async fn test_upload_and_feature() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("hero.jpg");
        std::fs::write(&file, b"jpeg-bytes").unwrap();

        let server = MockServer::start_async().await;
        let upload = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/wp-json/wp/v2/media")
                    .header("content-type", "image/jpeg")
                    .header("content-disposition", "attachment; filename=\"hero.jpg\"")
                    .body("jpeg-bytes");
                then.status(201).json_body(serde_json::json!({
                    "id": 5, "source_url": "https://blog.example/hero.jpg"
                }));
            })
            .await;
        let details = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/wp-json/wp/v2/media/5")
                    .json_body_partial(r#"{"alt_text": "Children at the gate"}"#);
                then.status(200).json_body(serde_json::json!({"id": 5}));
            })
            .await;
        let feature = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/wp-json/wp/v2/posts/77")
                    .json_body(serde_json::json!({"featured_media": 5}));
                then.status(200).json_body(serde_json::json!({"id": 77}));
            })
            .await;

        let wp = WordPressPublisher::new(&settings(server.base_url())).unwrap();
        let media = wp
            .upload_media(&MediaUpload {
                file_path: file.to_string_lossy().into_owned(),
                title: None,
                caption: None,
                alt_text: Some("Children at the gate".to_string()),
            })
            .await
            .unwrap();
        wp.set_featured_media(77, media.id).await.unwrap();

        upload.assert_async().await;
        details.assert_async().await;
        feature.assert_async().await;
        assert_eq!(media.url, "https://blog.example/hero.jpg");
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let wp = WordPressPublisher::new(&settings("http://127.0.0.1:9".to_string())).unwrap();
        let err = wp
            .upload_media(&MediaUpload {
                file_path: "/definitely/not/here.png".to_string(),
                title: None,
                caption: None,
                alt_text: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::PublishFailed { .. }));
    }
}
