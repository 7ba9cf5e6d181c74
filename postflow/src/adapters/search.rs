//! Web search contract.
//!
//! One canonical shape: `query`, `limit` (1-10, default 10) and `engine`
//! (default Google) in; ranked hits plus totals out.

use crate::contracts::{FieldSpec, Schema};
use crate::errors::AdapterError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Largest number of hits a single search may return.
pub const MAX_SEARCH_RESULTS: u32 = 10;

const fn default_limit() -> u32 {
    MAX_SEARCH_RESULTS
}

/// Search engine to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchEngine {
    /// Google.
    #[default]
    Google,
    /// Bing.
    Bing,
    /// Yahoo.
    Yahoo,
    /// DuckDuckGo.
    #[serde(rename = "duckduckgo")]
    DuckDuckGo,
}

impl SearchEngine {
    /// Returns the engine's wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Bing => "bing",
            Self::Yahoo => "yahoo",
            Self::DuckDuckGo => "duckduckgo",
        }
    }
}

/// A search query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// The query text.
    pub query: String,
    /// Maximum number of hits.
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Engine to query.
    #[serde(default)]
    pub engine: SearchEngine,
}

impl SearchRequest {
    /// Creates a request with the default limit and engine.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: default_limit(),
            engine: SearchEngine::default(),
        }
    }

    /// Sets the limit, clamped to `1..=MAX_SEARCH_RESULTS`.
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.clamp(1, MAX_SEARCH_RESULTS);
        self
    }

    /// Sets the engine.
    #[must_use]
    pub fn with_engine(mut self, engine: SearchEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Input schema used when search is exposed as a model tool.
    #[must_use]
    pub fn schema() -> Schema {
        Schema::new("web_search")
            .field(
                FieldSpec::string("query")
                    .required()
                    .with_min_length(1)
                    .with_description("Search query"),
            )
            .field(
                FieldSpec::integer("limit")
                    .between(1.0, f64::from(MAX_SEARCH_RESULTS))
                    .with_default(MAX_SEARCH_RESULTS)
                    .with_description("Number of results to return"),
            )
            .field(
                FieldSpec::string("engine")
                    .one_of(&["google", "bing", "yahoo", "duckduckgo"])
                    .with_default("google")
                    .with_description("Search engine to use"),
            )
    }
}

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Page title.
    pub title: String,
    /// Page URL.
    pub link: String,
    /// Result snippet.
    #[serde(default)]
    pub snippet: String,
    /// 1-based rank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    /// Publishing site, when the provider reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// The answer to a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Ranked hits, best first.
    pub results: Vec<SearchHit>,
    /// Total hits reported by the provider.
    pub total_results: u64,
    /// Provider-side search time in seconds.
    pub search_time: f64,
    /// The query that was run.
    pub query: String,
}

/// A web search provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchAdapter: Send + Sync {
    /// Runs a search.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::SearchUnavailable`] when the provider cannot
    /// answer.
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, AdapterError>;
}
