//! Scriptable in-memory backend for tests.
//!
//! Replies are consumed in order; an exhausted script keeps returning
//! the last entry so single-reply mocks can serve repeated calls.
//! Prompts are recorded for assertions on prompt shaping and call
//! counts.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{ChatRequest, ChatResponse, LlmBackend, LlmError};
use crate::stream::DeltaStream;

enum Reply {
    Content(String),
    Failure(String),
}

#[derive(Default)]
struct MockState {
    replies: Vec<Reply>,
    cursor: usize,
    prompts: Vec<String>,
}

pub struct MockBackend {
    model: String,
    state: Mutex<MockState>,
    delay: Option<Duration>,
    sse_document: Option<String>,
}

impl MockBackend {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            state: Mutex::new(MockState::default()),
            delay: None,
            sse_document: None,
        }
    }

    /// Queue a successful reply.
    pub fn with_reply(self, content: impl Into<String>) -> Self {
        self.state.lock().unwrap().replies.push(Reply::Content(content.into()));
        self
    }

    /// Queue a failing call.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.state.lock().unwrap().replies.push(Reply::Failure(message.into()));
        self
    }

    /// Sleep before answering, to exercise timeout paths.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Serve this SSE document from `complete_stream`.
    pub fn with_sse_document(mut self, doc: impl Into<String>) -> Self {
        self.sse_document = Some(doc.into());
        self
    }

    /// Number of `complete` calls observed.
    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().prompts.len()
    }

    /// Prompts observed, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.state.lock().unwrap().prompts.clone()
    }

    fn next_reply(&self, prompt: &str) -> Result<String, LlmError> {
        let mut state = self.state.lock().unwrap();
        state.prompts.push(prompt.to_string());
        if state.replies.is_empty() {
            return Err(LlmError::Unavailable(format!("{}: no scripted reply", self.model)));
        }
        let idx = state.cursor.min(state.replies.len() - 1);
        state.cursor += 1;
        match &state.replies[idx] {
            Reply::Content(c) => Ok(c.clone()),
            Reply::Failure(m) => Err(LlmError::Unavailable(m.clone())),
        }
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn complete(&self, req: ChatRequest) -> Result<ChatResponse, LlmError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let prompt = req
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let content = self.next_reply(&prompt)?;
        Ok(ChatResponse {
            content,
            model: self.model.clone(),
            prompt_tokens: 0,
            completion_tokens: 0,
        })
    }

    async fn complete_stream(&self, req: ChatRequest) -> Result<DeltaStream, LlmError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let prompt = req
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.state.lock().unwrap().prompts.push(prompt);
        match &self.sse_document {
            Some(doc) => Ok(DeltaStream::from_sse_text(doc)),
            None => Err(LlmError::Unavailable(format!("{}: no SSE document", self.model))),
        }
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn is_local(&self) -> bool {
        true
    }
}
