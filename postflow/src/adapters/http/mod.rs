//! reqwest-backed adapter implementations.

mod fetcher;
mod rest_store;
mod serpapi;
mod wordpress;

pub use fetcher::{extract_page, HttpFetcher};
pub use rest_store::RestContentStore;
pub use serpapi::SerpApiSearch;
pub use wordpress::WordPressPublisher;

use crate::errors::ConfigError;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

pub(crate) fn build_client(timeout: Duration, user_agent: Option<&str>) -> Result<Client, ConfigError> {
    let mut builder = Client::builder().timeout(timeout);
    if let Some(agent) = user_agent {
        builder = builder.user_agent(agent);
    } else {
        builder = builder.user_agent(concat!("postflow/", env!("CARGO_PKG_VERSION")));
    }
    builder
        .build()
        .map_err(|e| ConfigError::Invalid {
            key: "http_client".to_string(),
            reason: e.to_string(),
        })
}

/// Turns a non-success response into a readable message.
pub(crate) async fn describe_failure(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::TOO_MANY_REQUESTS => format!("Rate limit exceeded (API response: {body})"),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            "Invalid credentials. Please check the configured key.".to_string()
        }
        StatusCode::BAD_REQUEST => format!("Invalid request: {body}"),
        StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE => {
            "Service is temporarily unavailable.".to_string()
        }
        status => format!("API error (status {status}): {body}"),
    }
}

/// Formats a transport error, naming timeouts explicitly.
pub(crate) fn describe_transport(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {error}")
    } else {
        error.to_string()
    }
}
