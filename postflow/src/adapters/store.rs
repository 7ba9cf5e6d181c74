//! Content datastore contract and an in-memory implementation.
//!
//! The datastore keeps the canonical copy of every article before it is
//! pushed to the CMS. Articles are keyed by slug: saving an article whose
//! slug already exists updates the stored record and keeps its id.

use super::publish::{Article, Category};
use crate::errors::AdapterError;
use crate::utils::content_hash;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// An article as held by the datastore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArticle {
    /// Datastore identifier.
    pub id: u64,
    /// The stored fields.
    #[serde(flatten)]
    pub article: Article,
    /// Fingerprint of title and body.
    pub content_hash: String,
    /// CMS post this article was published as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cms_post_id: Option<u64>,
    /// First save.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

/// A content datastore.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Lists the datastore's categories.
    async fn categories(&self) -> Result<Vec<Category>, AdapterError>;

    /// Creates or updates the article with the same slug.
    ///
    /// # Errors
    ///
    /// [`AdapterError::CategoryInvalid`] for an unknown category,
    /// [`AdapterError::PublishFailed`] when the write fails.
    async fn upsert_article(&self, article: &Article) -> Result<StoredArticle, AdapterError>;

    /// Fetches an article by id.
    async fn get_article(&self, id: u64) -> Result<Option<StoredArticle>, AdapterError>;

    /// Records the CMS post an article was published as, so a later publish
    /// updates that post instead of creating another.
    ///
    /// # Errors
    ///
    /// [`AdapterError::PublishFailed`] when the article does not exist or
    /// the write fails.
    async fn link_cms_post(&self, id: u64, post_id: u64) -> Result<(), AdapterError>;
}

/// Process-local datastore backed by a concurrent map.
#[derive(Debug)]
pub struct InMemoryContentStore {
    categories: Vec<Category>,
    articles: DashMap<u64, StoredArticle>,
    by_slug: DashMap<String, u64>,
    next_id: AtomicU64,
}

impl InMemoryContentStore {
    /// Creates a store with the given categories.
    #[must_use]
    pub fn new(categories: Vec<Category>) -> Self {
        Self {
            categories,
            articles: DashMap::new(),
            by_slug: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the number of stored articles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.articles.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new(vec![Category::new(1, "General")])
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn categories(&self) -> Result<Vec<Category>, AdapterError> {
        Ok(self.categories.clone())
    }

    async fn upsert_article(&self, article: &Article) -> Result<StoredArticle, AdapterError> {
        if !self.categories.iter().any(|c| c.id == article.category_id) {
            return Err(AdapterError::category_invalid("datastore", article.category_id));
        }
        if article.slug.is_empty() {
            return Err(AdapterError::publish_failed("datastore", "article slug is empty"));
        }

        let hash = content_hash(&article.title, &article.content);
        let now = Utc::now();

        // The slug entry guard is held across the update so concurrent saves
        // of one slug resolve to a single id.
        let slug_guard = self
            .by_slug
            .entry(article.slug.clone())
            .or_insert_with(|| self.next_id.fetch_add(1, Ordering::SeqCst));
        let id = *slug_guard;

        let stored = match self.articles.get_mut(&id) {
            Some(mut existing) => {
                if existing.content_hash != hash || existing.article != *article {
                    existing.article = article.clone();
                    existing.content_hash = hash;
                    existing.updated_at = now;
                } else {
                    debug!(id, slug = %article.slug, "Article unchanged");
                }
                existing.clone()
            }
            None => {
                let stored = StoredArticle {
                    id,
                    article: article.clone(),
                    content_hash: hash,
                    cms_post_id: None,
                    created_at: now,
                    updated_at: now,
                };
                self.articles.insert(id, stored.clone());
                stored
            }
        };
        drop(slug_guard);

        Ok(stored)
    }

    async fn get_article(&self, id: u64) -> Result<Option<StoredArticle>, AdapterError> {
        Ok(self.articles.get(&id).map(|a| a.clone()))
    }

    async fn link_cms_post(&self, id: u64, post_id: u64) -> Result<(), AdapterError> {
        let mut stored = self
            .articles
            .get_mut(&id)
            .ok_or_else(|| AdapterError::publish_failed("datastore", format!("article {id} not found")))?;
        stored.cms_post_id = Some(post_id);
        Ok(())
    }
}
