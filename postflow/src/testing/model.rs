//! A language model that replays scripted answers.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::agents::{ChatRequest, ChatResponse, LanguageModel};

/// Replays queued answers in order and records every request.
///
/// Running out of answers is reported as a model failure.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<ChatResponse, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    /// Creates a model with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a plain text answer.
    #[must_use]
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.respond_with(ChatResponse::text(text))
    }

    /// Queues a full response, e.g. one carrying tool calls.
    #[must_use]
    pub fn respond_with(self, response: ChatResponse) -> Self {
        self.script.lock().push_back(Ok(response));
        self
    }

    /// Queues a failure.
    #[must_use]
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.script.lock().push_back(Err(message.into()));
        self
    }

    /// Returns the requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of answers not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<ChatResponse> {
        self.requests.lock().push(request.clone());
        let next = self.script.lock().pop_front();
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => anyhow::bail!("scripted model has no answer left"),
        }
    }
}
