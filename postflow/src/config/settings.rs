//! Process configuration.
//!
//! Settings are loaded once at startup, from a JSON file, the environment,
//! or both (environment wins), and passed by reference into adapter and
//! model constructors. Nothing else in the crate reads the environment.

use crate::adapters::{PostStatus, SearchEngine};
use crate::errors::ConfigError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A secret string that never appears in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true if no secret is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("\"\"")
        } else {
            f.write_str("\"***\"")
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_max_tool_rounds() -> usize {
    4
}

fn default_search_base_url() -> String {
    "https://serpapi.com".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
        .to_string()
}

fn default_max_content_chars() -> usize {
    20_000
}

fn default_wordpress_categories() -> Vec<u64> {
    vec![10, 1]
}

fn default_store_categories() -> Vec<u64> {
    vec![2, 1]
}

fn default_articles_table() -> String {
    "articles".to_string()
}

fn default_categories_table() -> String {
    "categories".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_image_width() -> u32 {
    1200
}

fn default_image_quality() -> u8 {
    80
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Model provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    /// OpenAI-compatible API root.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Bearer token.
    #[serde(default)]
    pub api_key: Secret,
    /// Default model name for agents.
    #[serde(default = "default_model")]
    pub model: String,
    /// Request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Completion token limit.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Tool-call rounds an agent may take before giving up.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: Secret::default(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            temperature: None,
            max_tokens: default_max_tokens(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

impl LlmSettings {
    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Search provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Provider API root.
    #[serde(default = "default_search_base_url")]
    pub base_url: String,
    /// Provider key.
    #[serde(default)]
    pub api_key: Secret,
    /// Engine used when a request does not name one.
    #[serde(default)]
    pub engine: SearchEngine,
    /// Request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            api_key: Secret::default(),
            engine: SearchEngine::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SearchSettings {
    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Page fetch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSettings {
    /// User-Agent header sent with every fetch.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extracted text is cut to this many characters.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

impl FetchSettings {
    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// WordPress settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordPressSettings {
    /// Site root, e.g. `https://example.com`.
    #[serde(default)]
    pub base_url: String,
    /// Account name.
    #[serde(default)]
    pub username: String,
    /// Application password.
    #[serde(default)]
    pub app_password: Secret,
    /// Status given to new posts.
    #[serde(default)]
    pub status: PostStatus,
    /// Categories to file posts under, most preferred first.
    #[serde(default = "default_wordpress_categories")]
    pub preferred_category_ids: Vec<u64>,
    /// Request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WordPressSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            app_password: Secret::default(),
            status: PostStatus::Draft,
            preferred_category_ids: default_wordpress_categories(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl WordPressSettings {
    /// Returns true if a site and credentials are configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.username.is_empty() && !self.app_password.is_empty()
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Content datastore settings (PostgREST-compatible endpoint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Project root, e.g. `https://xyz.supabase.co`.
    #[serde(default)]
    pub base_url: String,
    /// Service key.
    #[serde(default)]
    pub api_key: Secret,
    /// Articles table.
    #[serde(default = "default_articles_table")]
    pub articles_table: String,
    /// Categories table.
    #[serde(default = "default_categories_table")]
    pub categories_table: String,
    /// Categories to file articles under, most preferred first.
    #[serde(default = "default_store_categories")]
    pub preferred_category_ids: Vec<u64>,
    /// Request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: Secret::default(),
            articles_table: default_articles_table(),
            categories_table: default_categories_table(),
            preferred_category_ids: default_store_categories(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl StoreSettings {
    /// Returns true if an endpoint and key are configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.api_key.is_empty()
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Local media generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSettings {
    /// Directory generated files are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Target width for optimized blog images.
    #[serde(default = "default_image_width")]
    pub image_width: u32,
    /// JPEG quality for optimized blog images.
    #[serde(default = "default_image_quality")]
    pub image_quality: u8,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            image_width: default_image_width(),
            image_quality: default_image_quality(),
        }
    }
}

impl MediaSettings {
    /// Returns the path a generated file named `file_name` is written to.
    #[must_use]
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// All process settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Model provider.
    #[serde(default)]
    pub llm: LlmSettings,
    /// Search provider.
    #[serde(default)]
    pub search: SearchSettings,
    /// Page fetching.
    #[serde(default)]
    pub fetch: FetchSettings,
    /// WordPress target.
    #[serde(default)]
    pub wordpress: WordPressSettings,
    /// Content datastore.
    #[serde(default)]
    pub store: StoreSettings,
    /// Local media output.
    #[serde(default)]
    pub media: MediaSettings,
    /// Logging.
    #[serde(default)]
    pub logging: LogSettings,
}

impl Settings {
    /// Sets the default agent model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.llm.model = model.into();
        self
    }

    /// Sets the model provider's API root.
    #[must_use]
    pub fn with_llm_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.llm.base_url = base_url.into();
        self
    }

    /// Sets the search provider's API root.
    #[must_use]
    pub fn with_search_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.search.base_url = base_url.into();
        self
    }

    /// Sets the media output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.media.output_dir = dir.into();
        self
    }

    /// Sets the logging filter.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.logging.level = level.into();
        self
    }

    /// Loads settings from the process environment over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Loads settings from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        read_json_file(path).map_err(|e| ConfigError::File(format!("{e:#}")))
    }

    /// Loads the file (if given) and then applies the environment on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) if path.exists() => Self::from_json_file(path)?,
            _ => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Overrides fields from a key lookup.
    ///
    /// Recognised keys: `OPENAI_API_KEY`, `POSTFLOW_LLM_BASE_URL`,
    /// `POSTFLOW_LLM_MODEL`, `POSTFLOW_LLM_TIMEOUT_SECS`,
    /// `POSTFLOW_LLM_MAX_TOKENS`, `POSTFLOW_LLM_MAX_TOOL_ROUNDS`,
    /// `SERPAPI_API_KEY`, `POSTFLOW_SEARCH_ENGINE`, `POSTFLOW_FETCH_USER_AGENT`,
    /// `POSTFLOW_FETCH_TIMEOUT_SECS`, `WORDPRESS_URL`, `WORDPRESS_USERNAME`,
    /// `WORDPRESS_APP_PASSWORD`, `POSTFLOW_WP_STATUS`, `SUPABASE_URL`,
    /// `SUPABASE_KEY`, `POSTFLOW_OUTPUT_DIR`, `POSTFLOW_LOG`, `POSTFLOW_LOG_JSON`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("OPENAI_API_KEY") {
            self.llm.api_key = Secret::new(v);
        }
        if let Some(v) = get("POSTFLOW_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = get("POSTFLOW_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("POSTFLOW_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_number("POSTFLOW_LLM_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("POSTFLOW_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_number("POSTFLOW_LLM_MAX_TOKENS", &v)?;
        }
        if let Some(v) = get("POSTFLOW_LLM_MAX_TOOL_ROUNDS") {
            self.llm.max_tool_rounds = parse_number("POSTFLOW_LLM_MAX_TOOL_ROUNDS", &v)?;
        }

        if let Some(v) = get("SERPAPI_API_KEY") {
            self.search.api_key = Secret::new(v);
        }
        if let Some(v) = get("POSTFLOW_SEARCH_ENGINE") {
            self.search.engine = parse_enum("POSTFLOW_SEARCH_ENGINE", &v)?;
        }

        if let Some(v) = get("POSTFLOW_FETCH_USER_AGENT") {
            self.fetch.user_agent = v;
        }
        if let Some(v) = get("POSTFLOW_FETCH_TIMEOUT_SECS") {
            self.fetch.timeout_secs = parse_number("POSTFLOW_FETCH_TIMEOUT_SECS", &v)?;
        }

        if let Some(v) = get("WORDPRESS_URL") {
            self.wordpress.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("WORDPRESS_USERNAME") {
            self.wordpress.username = v;
        }
        if let Some(v) = get("WORDPRESS_APP_PASSWORD") {
            self.wordpress.app_password = Secret::new(v);
        }
        if let Some(v) = get("POSTFLOW_WP_STATUS") {
            self.wordpress.status = parse_enum("POSTFLOW_WP_STATUS", &v)?;
        }

        if let Some(v) = get("SUPABASE_URL") {
            self.store.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("SUPABASE_KEY") {
            self.store.api_key = Secret::new(v);
        }

        if let Some(v) = get("POSTFLOW_OUTPUT_DIR") {
            self.media.output_dir = PathBuf::from(v);
        }

        if let Some(v) = get("POSTFLOW_LOG") {
            self.logging.level = v;
        }
        if let Some(v) = get("POSTFLOW_LOG_JSON") {
            self.logging.json = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        Ok(())
    }
}

fn read_json_file(path: &Path) -> anyhow::Result<Settings> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed reading config at {}", path.display()))?;
    let settings = serde_json::from_str(&contents)
        .with_context(|| format!("Failed parsing JSON config at {}", path.display()))?;
    Ok(settings)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn parse_enum<T: serde::de::DeserializeOwned>(key: &str, value: &str) -> Result<T, ConfigError> {
    serde_json::from_value(serde_json::Value::String(value.trim().to_ascii_lowercase())).map_err(|e| {
        ConfigError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Returns the secret or a [`ConfigError::Missing`] naming `key`.
pub fn require_secret<'a>(secret: &'a Secret, key: &str) -> Result<&'a str, ConfigError> {
    if secret.is_empty() {
        Err(ConfigError::Missing { key: key.to_string() })
    } else {
        Ok(secret.expose())
    }
}
