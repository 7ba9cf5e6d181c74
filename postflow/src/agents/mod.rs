//! Model-backed agents.
//!
//! An [`Agent`] is an immutable binding of a name, persona instructions, a
//! [`ModelRef`] and the [`Capabilities`] it may use. Agents are shared
//! read-only across runs via `Arc`.

mod agent;
pub mod capabilities;
pub mod model;
pub mod personas;

#[cfg(feature = "http")]
mod openai;

pub use agent::{Agent, AgentResponse, ModelRef, DEFAULT_MAX_TOOL_ROUNDS};
pub use capabilities::{Capabilities, ToolInvocation};
pub use model::{ChatMessage, ChatRequest, ChatResponse, LanguageModel, Role, ToolCall, ToolSpec};

#[cfg(feature = "http")]
pub use openai::OpenAiChatModel;
