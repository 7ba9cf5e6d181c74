//! PostgREST-compatible content datastore (e.g. Supabase).

use super::{build_client, describe_failure, describe_transport};
use crate::adapters::publish::{Article, Category};
use crate::adapters::store::{ContentStore, StoredArticle};
use crate::config::{require_secret, StoreSettings};
use crate::errors::{AdapterError, ConfigError};
use crate::utils::content_hash;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::json;
use tracing::{debug, instrument};

const TARGET: &str = "datastore";

/// Stores articles through a PostgREST `/rest/v1` endpoint.
#[derive(Debug, Clone)]
pub struct RestContentStore {
    http: Client,
    rest_root: String,
    api_key: String,
    articles_table: String,
    categories_table: String,
}

impl RestContentStore {
    /// Creates a store client.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Missing`] when the endpoint or key is absent.
    pub fn new(settings: &StoreSettings) -> Result<Self, ConfigError> {
        if settings.base_url.is_empty() {
            return Err(ConfigError::Missing {
                key: "SUPABASE_URL".to_string(),
            });
        }
        let api_key = require_secret(&settings.api_key, "SUPABASE_KEY")?.to_string();
        Ok(Self {
            http: build_client(settings.timeout(), None)?,
            rest_root: format!("{}/rest/v1", settings.base_url.trim_end_matches('/')),
            api_key,
            articles_table: settings.articles_table.clone(),
            categories_table: settings.categories_table.clone(),
        })
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{table}", self.rest_root)
    }
}

#[async_trait]
impl ContentStore for RestContentStore {
    async fn categories(&self) -> Result<Vec<Category>, AdapterError> {
        let response = self
            .authed(self.http.get(self.table_url(&self.categories_table)))
            .query(&[("select", "id,name,slug")])
            .send()
            .await
            .map_err(|e| AdapterError::publish_failed(TARGET, describe_transport(&e)))?;
        if !response.status().is_success() {
            return Err(AdapterError::publish_failed(TARGET, describe_failure(response).await));
        }
        response
            .json()
            .await
            .map_err(|e| AdapterError::publish_failed(TARGET, format!("malformed response: {e}")))
    }

    #[instrument(skip(self, article), fields(slug = %article.slug, category_id = article.category_id))]
    async fn upsert_article(&self, article: &Article) -> Result<StoredArticle, AdapterError> {
        if article.slug.is_empty() {
            return Err(AdapterError::publish_failed(TARGET, "article slug is empty"));
        }
        let categories = self.categories().await?;
        if !categories.iter().any(|c| c.id == article.category_id) {
            return Err(AdapterError::category_invalid(TARGET, article.category_id));
        }

        let row = json!([{
            "title": article.title,
            "content": article.content,
            "excerpt": article.excerpt,
            "keywords": article.keywords,
            "slug": article.slug,
            "category_id": article.category_id,
            "status": article.status.as_str(),
            "content_hash": content_hash(&article.title, &article.content),
        }]);

        let response = self
            .authed(self.http.post(self.table_url(&self.articles_table)))
            .query(&[("on_conflict", "slug")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&row)
            .send()
            .await
            .map_err(|e| AdapterError::publish_failed(TARGET, describe_transport(&e)))?;

        match response.status() {
            StatusCode::CONFLICT => {
                // Foreign key violation: the category vanished between lookup and write.
                return Err(AdapterError::category_invalid(TARGET, article.category_id));
            }
            status if !status.is_success() => {
                return Err(AdapterError::publish_failed(TARGET, describe_failure(response).await));
            }
            _ => {}
        }

        let mut rows: Vec<StoredArticle> = response
            .json()
            .await
            .map_err(|e| AdapterError::publish_failed(TARGET, format!("malformed response: {e}")))?;
        let stored = rows
            .pop()
            .ok_or_else(|| AdapterError::publish_failed(TARGET, "upsert returned no rows"))?;
        debug!(id = stored.id, "Stored article");
        Ok(stored)
    }

    async fn get_article(&self, id: u64) -> Result<Option<StoredArticle>, AdapterError> {
        let filter = format!("eq.{id}");
        let response = self
            .authed(self.http.get(self.table_url(&self.articles_table)))
            .query(&[("id", filter.as_str()), ("select", "*")])
            .send()
            .await
            .map_err(|e| AdapterError::publish_failed(TARGET, describe_transport(&e)))?;
        if !response.status().is_success() {
            return Err(AdapterError::publish_failed(TARGET, describe_failure(response).await));
        }
        let mut rows: Vec<StoredArticle> = response
            .json()
            .await
            .map_err(|e| AdapterError::publish_failed(TARGET, format!("malformed response: {e}")))?;
        Ok(rows.pop())
    }

    async fn link_cms_post(&self, id: u64, post_id: u64) -> Result<(), AdapterError> {
        let filter = format!("eq.{id}");
        let response = self
            .authed(self.http.patch(self.table_url(&self.articles_table)))
            .query(&[("id", filter.as_str())])
            .header("Prefer", "return=minimal")
            .json(&json!({ "cms_post_id": post_id }))
            .send()
            .await
            .map_err(|e| AdapterError::publish_failed(TARGET, describe_transport(&e)))?;
        if !response.status().is_success() {
            return Err(AdapterError::publish_failed(TARGET, describe_failure(response).await));
        }
        debug!(id, post_id, "Linked CMS post");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::publish::PostStatus;
    use crate::config::Secret;
    use httpmock::prelude::*;
    use httpmock::Method::PATCH;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn settings(base_url: String) -> StoreSettings {
        StoreSettings {
            base_url,
            api_key: Secret::new("service-key"),
            ..StoreSettings::default()
        }
    }

    fn article() -> Article {
        Article {
            title: "Safe pickups".to_string(),
            content: "# Body".to_string(),
            excerpt: "meta".to_string(),
            keywords: vec!["pickup".to_string()],
            slug: "safe-pickups".to_string(),
            category_id: 2,
            status: PostStatus::Draft,
        }
    }

    fn stored_row(id: u64) -> Value {
        json!({
            "id": id,
            "title": "Safe pickups",
            "content": "# Body",
            "excerpt": "meta",
            "keywords": ["pickup"],
            "slug": "safe-pickups",
            "category_id": 2,
            "status": "draft",
            "content_hash": content_hash("Safe pickups", "# Body"),
            "cms_post_id": null,
            "created_at": "2024-05-01T09:00:00+00:00",
            "updated_at": "2024-05-01T09:00:00+00:00"
        })
    }

    async fn mock_categories(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/categories")
                    .header("apikey", "service-key");
                then.status(200)
                    .json_body(json!([{"id": 1, "name": "General"}, {"id": 2, "name": "Escort"}]));
            })
            .await;
    }

    #[tokio::test]
    async fn test_upsert_on_slug() {
        let server = MockServer::start_async().await;
        mock_categories(&server).await;
        let upsert = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rest/v1/articles")
                    .query_param("on_conflict", "slug")
                    .header("prefer", "resolution=merge-duplicates,return=representation")
                    .header("authorization", "Bearer service-key");
                then.status(201).json_body(json!([stored_row(41)]));
            })
            .await;

        let store = RestContentStore::new(&settings(server.base_url())).unwrap();
        let stored = store.upsert_article(&article()).await.unwrap();

        upsert.assert_async().await;
        assert_eq!(stored.id, 41);
        assert_eq!(stored.article, article());
    }

    #[tokio::test]
    async fn test_unknown_category_is_rejected_before_write() {
        let server = MockServer::start_async().await;
        mock_categories(&server).await;
        let upsert = server
            .mock_async(|when, then| {
                when.method(POST).path("/rest/v1/articles");
                then.status(201).json_body(json!([]));
            })
            .await;

        let store = RestContentStore::new(&settings(server.base_url())).unwrap();
        let mut bad = article();
        bad.category_id = 99;
        let err = store.upsert_article(&bad).await.unwrap_err();

        assert_eq!(err, AdapterError::category_invalid("datastore", 99));
        upsert.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_get_article() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/articles")
                    .query_param("id", "eq.41");
                then.status(200).json_body(json!([stored_row(41)]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/articles")
                    .query_param("id", "eq.5");
                then.status(200).json_body(json!([]));
            })
            .await;

        let store = RestContentStore::new(&settings(server.base_url())).unwrap();
        let found = store.get_article(41).await.unwrap().unwrap();
        assert_eq!(found.article.title, "Safe pickups");
        assert!(store.get_article(5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_link_cms_post() {
        let server = MockServer::start_async().await;
        let patch = server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path("/rest/v1/articles")
                    .query_param("id", "eq.41")
                    .json_body(json!({"cms_post_id": 100}));
                then.status(204);
            })
            .await;

        let store = RestContentStore::new(&settings(server.base_url())).unwrap();
        store.link_cms_post(41, 100).await.unwrap();

        patch.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/categories");
                then.status(500);
            })
            .await;

        let store = RestContentStore::new(&settings(server.base_url())).unwrap();
        let err = store.categories().await.unwrap_err();
        assert!(matches!(err, AdapterError::PublishFailed { .. }));
    }

    #[test]
    fn test_requires_settings() {
        assert!(matches!(
            RestContentStore::new(&StoreSettings::default()),
            Err(ConfigError::Missing { .. })
        ));
    }
}
