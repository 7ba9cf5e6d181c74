//! Explicit configuration objects.

mod settings;

pub use settings::{
    require_secret, FetchSettings, LlmSettings, LogSettings, MediaSettings, SearchSettings, Secret,
    Settings, StoreSettings, WordPressSettings,
};
