//! SerpAPI search client.

use super::{build_client, describe_failure, describe_transport};
use crate::adapters::search::{SearchAdapter, SearchEngine, SearchHit, SearchRequest, SearchResponse};
use crate::config::{require_secret, SearchSettings};
use crate::errors::{AdapterError, ConfigError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, instrument};

/// Web search through SerpAPI's `search.json` endpoint.
#[derive(Debug, Clone)]
pub struct SerpApiSearch {
    http: Client,
    base_url: String,
    api_key: String,
}

impl SerpApiSearch {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Missing`] when no API key is configured.
    pub fn new(settings: &SearchSettings) -> Result<Self, ConfigError> {
        let api_key = require_secret(&settings.api_key, "SERPAPI_API_KEY")?.to_string();
        Ok(Self {
            http: build_client(settings.timeout(), None)?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<SerpHit>,
    #[serde(default)]
    search_information: Option<SerpInfo>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    position: Option<u32>,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpInfo {
    #[serde(default)]
    total_results: Option<u64>,
    #[serde(default)]
    time_taken_displayed: Option<f64>,
}

const fn query_param(engine: SearchEngine) -> &'static str {
    match engine {
        SearchEngine::Yahoo => "p",
        SearchEngine::Google | SearchEngine::Bing | SearchEngine::DuckDuckGo => "q",
    }
}

#[async_trait]
impl SearchAdapter for SerpApiSearch {
    #[instrument(skip(self), fields(engine = request.engine.as_str(), limit = request.limit))]
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, AdapterError> {
        let url = format!("{}/search.json", self.base_url);
        let limit = request.limit.to_string();
        let started = Instant::now();

        let response = self
            .http
            .get(&url)
            .query(&[
                ("engine", request.engine.as_str()),
                (query_param(request.engine), request.query.as_str()),
                ("num", limit.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AdapterError::search_unavailable(describe_transport(&e)))?;

        if !response.status().is_success() {
            return Err(AdapterError::search_unavailable(describe_failure(response).await));
        }

        let body: SerpResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::search_unavailable(format!("malformed response: {e}")))?;
        if let Some(error) = body.error {
            return Err(AdapterError::search_unavailable(error));
        }

        let results: Vec<SearchHit> = body
            .organic_results
            .into_iter()
            .take(request.limit as usize)
            .map(|hit| SearchHit {
                title: hit.title,
                link: hit.link,
                snippet: hit.snippet,
                position: hit.position,
                source: hit.source,
            })
            .collect();

        let info = body.search_information;
        let total_results = info
            .as_ref()
            .and_then(|i| i.total_results)
            .unwrap_or(results.len() as u64);
        let search_time = info
            .and_then(|i| i.time_taken_displayed)
            .unwrap_or_else(|| started.elapsed().as_secs_f64());

        debug!(hits = results.len(), total_results, "Search finished");

        Ok(SearchResponse {
            results,
            total_results,
            search_time,
            query: request.query.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;
    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn settings(base_url: String) -> SearchSettings {
        SearchSettings {
            base_url,
            api_key: Secret::new("serp-key"),
            ..SearchSettings::default()
        }
    }

    #[test]
    fn test_requires_key() {
        let err = SerpApiSearch::new(&SearchSettings::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { ref key } if key == "SERPAPI_API_KEY"));
    }

    #[tokio::test]
    async fn test_search_maps_results() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/search.json")
                    .query_param("engine", "google")
                    .query_param("q", "after school pickup")
                    .query_param("num", "2")
                    .query_param("api_key", "serp-key");
                then.status(200).json_body(json!({
                    "search_information": {"total_results": 1200, "time_taken_displayed": 0.42},
                    "organic_results": [
                        {"title": "A", "link": "https://a.example", "snippet": "first", "position": 1, "source": "a.example"},
                        {"title": "B", "link": "https://b.example", "snippet": "second", "position": 2},
                        {"title": "C", "link": "https://c.example", "snippet": "third", "position": 3}
                    ]
                }));
            })
            .await;

        let search = SerpApiSearch::new(&settings(server.base_url())).unwrap();
        let response = search
            .search(&SearchRequest::new("after school pickup").with_limit(2))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].title, "A");
        assert_eq!(response.results[0].source.as_deref(), Some("a.example"));
        assert_eq!(response.results[1].position, Some(2));
        assert_eq!(response.total_results, 1200);
        assert!((response.search_time - 0.42).abs() < f64::EPSILON);
        assert_eq!(response.query, "after school pickup");
    }

    #[tokio::test]
    async fn test_yahoo_uses_p_param() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/search.json").query_param("p", "q");
                then.status(200).json_body(json!({"organic_results": []}));
            })
            .await;

        let search = SerpApiSearch::new(&settings(server.base_url())).unwrap();
        let response = search
            .search(&SearchRequest::new("q").with_engine(SearchEngine::Yahoo))
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(response.results.is_empty());
        assert_eq!(response.total_results, 0);
    }

    #[tokio::test]
    async fn test_provider_error_is_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/search.json");
                then.status(429).body("too many");
            })
            .await;

        let search = SerpApiSearch::new(&settings(server.base_url())).unwrap();
        let err = search.search(&SearchRequest::new("q")).await.unwrap_err();
        match err {
            AdapterError::SearchUnavailable { message } => assert!(message.contains("Rate limit")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_field_in_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/search.json");
                then.status(200).json_body(json!({"error": "Invalid API key."}));
            })
            .await;

        let search = SerpApiSearch::new(&settings(server.base_url())).unwrap();
        let err = search.search(&SearchRequest::new("q")).await.unwrap_err();
        assert_eq!(err, AdapterError::search_unavailable("Invalid API key."));
    }
}
