//! Adapter allow-lists bound into agents.
//!
//! An agent only sees the tools for the adapters it was given. Each tool's
//! arguments are checked against the request schema before the typed
//! request is built and the adapter is called.

use super::model::{ToolCall, ToolSpec};
use crate::adapters::{
    AudioGenerator, AudioRequest, FetchAdapter, FetchRequest, ImageOptimizeRequest, ImageProcessor,
    ImageSearchRequest, SearchAdapter, SearchRequest, VideoComposer, VideoRequest,
};
use crate::contracts::Schema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Tool name for web search.
pub const WEB_SEARCH: &str = "web_search";
/// Tool name for URL fetch.
pub const FETCH_URL: &str = "fetch_url";
/// Tool name for narration.
pub const GENERATE_AUDIO: &str = "generate_audio";
/// Tool name for stock image search.
pub const SEARCH_IMAGES: &str = "search_images";
/// Tool name for image optimization.
pub const OPTIMIZE_IMAGE: &str = "optimize_image";
/// Tool name for slideshow video creation.
pub const CREATE_VIDEO: &str = "create_video";

/// The record of one tool call made during a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Tool name.
    pub name: String,
    /// Arguments as sent by the model.
    pub arguments: Value,
    /// Adapter output, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Error reported back to the model, on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolInvocation {
    /// Returns true if the call succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The message content fed back to the model.
    #[must_use]
    pub fn to_message_content(&self) -> String {
        match (&self.output, &self.error) {
            (_, Some(error)) => json!({ "error": error }).to_string(),
            (Some(output), None) => output.to_string(),
            (None, None) => "null".to_string(),
        }
    }
}

/// The adapters an agent may call.
#[derive(Clone, Default)]
pub struct Capabilities {
    search: Option<Arc<dyn SearchAdapter>>,
    fetch: Option<Arc<dyn FetchAdapter>>,
    audio: Option<Arc<dyn AudioGenerator>>,
    images: Option<Arc<dyn ImageProcessor>>,
    video: Option<Arc<dyn VideoComposer>>,
}

impl Capabilities {
    /// No tools at all.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Allows web search.
    #[must_use]
    pub fn with_search(mut self, search: Arc<dyn SearchAdapter>) -> Self {
        self.search = Some(search);
        self
    }

    /// Allows URL fetch.
    #[must_use]
    pub fn with_fetch(mut self, fetch: Arc<dyn FetchAdapter>) -> Self {
        self.fetch = Some(fetch);
        self
    }

    /// Allows narration.
    #[must_use]
    pub fn with_audio(mut self, audio: Arc<dyn AudioGenerator>) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Allows image search and optimization.
    #[must_use]
    pub fn with_images(mut self, images: Arc<dyn ImageProcessor>) -> Self {
        self.images = Some(images);
        self
    }

    /// Allows video creation.
    #[must_use]
    pub fn with_video(mut self, video: Arc<dyn VideoComposer>) -> Self {
        self.video = Some(video);
        self
    }

    /// Names of the permitted tools.
    #[must_use]
    pub fn tool_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.search.is_some() {
            names.push(WEB_SEARCH);
        }
        if self.fetch.is_some() {
            names.push(FETCH_URL);
        }
        if self.audio.is_some() {
            names.push(GENERATE_AUDIO);
        }
        if self.images.is_some() {
            names.push(SEARCH_IMAGES);
            names.push(OPTIMIZE_IMAGE);
        }
        if self.video.is_some() {
            names.push(CREATE_VIDEO);
        }
        names
    }

    /// Returns true if `tool` may be called.
    #[must_use]
    pub fn allows(&self, tool: &str) -> bool {
        self.tool_names().contains(&tool)
    }

    /// Returns true if no tools are permitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tool_names().is_empty()
    }

    /// The tool catalogue advertised to the model.
    #[must_use]
    pub fn tools(&self) -> Vec<ToolSpec> {
        self.tool_names()
            .into_iter()
            .filter_map(|name| {
                let (schema, description) = tool_schema(name)?;
                Some(ToolSpec {
                    name: name.to_string(),
                    description: description.to_string(),
                    parameters: schema.to_json_schema(),
                })
            })
            .collect()
    }

    /// Executes a tool call.
    ///
    /// Calls outside the allow-list, invalid arguments and adapter failures
    /// are all returned as an errored [`ToolInvocation`] so the model can
    /// react; none of them abort the response.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolInvocation {
        let result = self.run(call).await;
        match &result {
            Ok(_) => debug!(tool = %call.name, "Tool call succeeded"),
            Err(error) => warn!(tool = %call.name, %error, "Tool call failed"),
        }
        let (output, error) = match result {
            Ok(output) => (Some(output), None),
            Err(error) => (None, Some(error)),
        };
        ToolInvocation {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            output,
            error,
        }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value, String> {
        if !self.allows(&call.name) {
            return Err(format!("tool '{}' is not available to this agent", call.name));
        }
        let args = &call.arguments;
        match call.name.as_str() {
            WEB_SEARCH => {
                let adapter = self.search.as_ref().ok_or_else(unavailable)?;
                let request: SearchRequest = parse_args(&SearchRequest::schema(), args)?;
                to_value(adapter.search(&request).await)
            }
            FETCH_URL => {
                let adapter = self.fetch.as_ref().ok_or_else(unavailable)?;
                let request: FetchRequest = parse_args(&FetchRequest::schema(), args)?;
                to_value(adapter.fetch(&request).await)
            }
            GENERATE_AUDIO => {
                let adapter = self.audio.as_ref().ok_or_else(unavailable)?;
                let request: AudioRequest = parse_args(&AudioRequest::schema(), args)?;
                to_value(adapter.generate_audio(&request).await)
            }
            SEARCH_IMAGES => {
                let adapter = self.images.as_ref().ok_or_else(unavailable)?;
                let request: ImageSearchRequest = parse_args(&ImageSearchRequest::schema(), args)?;
                to_value(adapter.search_images(&request).await)
            }
            OPTIMIZE_IMAGE => {
                let adapter = self.images.as_ref().ok_or_else(unavailable)?;
                let request: ImageOptimizeRequest = parse_args(&ImageOptimizeRequest::schema(), args)?;
                to_value(adapter.optimize_image(&request).await)
            }
            CREATE_VIDEO => {
                let adapter = self.video.as_ref().ok_or_else(unavailable)?;
                let request: VideoRequest = parse_args(&VideoRequest::schema(), args)?;
                to_value(adapter.create_video(&request).await)
            }
            other => Err(format!("unknown tool '{other}'")),
        }
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("tools", &self.tool_names())
            .finish()
    }
}

fn tool_schema(name: &str) -> Option<(Schema, &'static str)> {
    let entry = match name {
        WEB_SEARCH => (SearchRequest::schema(), "Search the web and return ranked results."),
        FETCH_URL => (FetchRequest::schema(), "Fetch a web page and return its readable text."),
        GENERATE_AUDIO => (AudioRequest::schema(), "Narrate text to an audio file."),
        SEARCH_IMAGES => (ImageSearchRequest::schema(), "Find stock images for a keyword."),
        OPTIMIZE_IMAGE => (ImageOptimizeRequest::schema(), "Download, resize and recompress an image."),
        CREATE_VIDEO => (VideoRequest::schema(), "Build a slideshow video from images and audio."),
        _ => return None,
    };
    Some(entry)
}

fn unavailable() -> String {
    "tool adapter is not configured".to_string()
}

fn parse_args<T: DeserializeOwned>(schema: &Schema, args: &Value) -> Result<T, String> {
    let normalized = schema.validate(args).map_err(|e| e.to_string())?;
    serde_json::from_value(normalized).map_err(|e| format!("invalid arguments: {e}"))
}

fn to_value<T: Serialize>(result: Result<T, crate::errors::AdapterError>) -> Result<Value, String> {
    let output = result.map_err(|e| e.to_string())?;
    serde_json::to_value(output).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSearch;
    use pretty_assertions::assert_eq;

    fn with_search() -> (Capabilities, Arc<FakeSearch>) {
        let search = Arc::new(FakeSearch::new());
        (Capabilities::none().with_search(search.clone()), search)
    }

    #[test]
    fn test_catalogue_matches_allow_list() {
        let (caps, _) = with_search();
        let tools = caps.tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, WEB_SEARCH);
        assert_eq!(tools[0].parameters["required"], json!(["query"]));
        assert!(caps.allows(WEB_SEARCH));
        assert!(!caps.allows(FETCH_URL));
        assert!(Capabilities::none().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_applies_defaults() {
        let (caps, search) = with_search();
        let invocation = caps
            .dispatch(&ToolCall::new("c1", WEB_SEARCH, json!({"query": "school pickup"})))
            .await;

        assert!(invocation.is_ok());
        let requests = search.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].limit, 10);
        assert_eq!(invocation.output.unwrap()["query"], json!("school pickup"));
    }

    #[tokio::test]
    async fn test_disallowed_tool_is_not_executed() {
        let (caps, search) = with_search();
        let invocation = caps
            .dispatch(&ToolCall::new("c1", FETCH_URL, json!({"url": "https://a"})))
            .await;

        assert!(!invocation.is_ok());
        assert!(invocation.error.as_deref().unwrap().contains("not available"));
        assert!(search.requests().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_arguments_are_reported() {
        let (caps, search) = with_search();
        let invocation = caps
            .dispatch(&ToolCall::new("c1", WEB_SEARCH, json!({"limit": 3})))
            .await;

        assert!(invocation.error.as_deref().unwrap().contains("query"));
        assert!(search.requests().is_empty());
    }

    #[tokio::test]
    async fn test_adapter_failure_is_reported() {
        let search = Arc::new(FakeSearch::new().failing());
        let caps = Capabilities::none().with_search(search);
        let invocation = caps
            .dispatch(&ToolCall::new("c1", WEB_SEARCH, json!({"query": "q"})))
            .await;

        assert!(invocation.error.as_deref().unwrap().contains("Search unavailable"));
        assert!(invocation.to_message_content().contains("error"));
    }
}
