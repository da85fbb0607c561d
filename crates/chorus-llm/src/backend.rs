//! LLM backend trait and concrete transports.
//! See ARCHITECTURE.md §5.1 and §5.2
//!
//! Backends:
//!   OllamaBackend           — local Ollama (OpenAI-compatible, keyless)
//!   OpenAiCompatibleBackend — any OpenAI-compatible endpoint (OpenRouter,
//!                             TogetherAI, Groq, HF router, vLLM, …)
//!
//! Both speak the chat-completions shape: one JSON reply for direct
//! calls, an SSE frame sequence (`choices[0].delta.content`, `[DONE]`
//! sentinel) for streaming calls.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stream::DeltaStream;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },
    #[error("Call timed out after {0}s")]
    Timeout(u64),
}

// ── Request / Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,   // "system" | "user" | "assistant"
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl ChatRequest {
    /// Single-user-message request, the common case in the pipeline.
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(prompt)],
            model: None,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// One direct call, one JSON reply.
    async fn complete(&self, req: ChatRequest) -> Result<ChatResponse, LlmError>;

    /// One streaming call; the returned stream yields per-frame text
    /// deltas until the terminal sentinel. Dropping the stream releases
    /// the underlying connection.
    async fn complete_stream(&self, req: ChatRequest) -> Result<DeltaStream, LlmError>;

    fn model_id(&self) -> &str;
    fn is_local(&self) -> bool;
}

// ── Helper: parse OpenAI-style response ──────────────────────────────────────

fn parse_openai_response(json: &serde_json::Value, fallback_model: &str) -> ChatResponse {
    ChatResponse {
        content: json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string(),
        model: json["model"]
            .as_str()
            .unwrap_or(fallback_model)
            .to_string(),
        prompt_tokens:     json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    }
}

async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = resp.status().as_u16();
    let body: serde_json::Value = resp.json().await?;
    if status >= 400 {
        let msg = body["error"]["message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .unwrap_or("unknown API error")
            .to_string();
        return Err(LlmError::ApiError { status, message: msg });
    }
    Ok(body)
}

fn chat_body(req: &ChatRequest, default_model: &str, stream: bool) -> serde_json::Value {
    serde_json::json!({
        "model":       req.model.as_deref().unwrap_or(default_model),
        "messages":    req.messages,
        "max_tokens":  req.max_tokens.unwrap_or(500),
        "temperature": req.temperature.unwrap_or(0.7),
        "stream":      stream,
    })
}

/// Fail fast on a non-success status before handing the body to the
/// SSE decoder; error bodies are not SSE.
async fn open_sse_stream(resp: reqwest::Response) -> Result<DeltaStream, LlmError> {
    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(LlmError::ApiError { status: status.as_u16(), message });
    }
    let bytes = resp
        .bytes_stream()
        .map_ok(|b| b.to_vec())
        .map_err(LlmError::Http);
    Ok(DeltaStream::new(Box::pin(bytes)))
}

// ── 1. Ollama (local) ─────────────────────────────────────────────────────────

pub struct OllamaBackend {
    pub base_url: String,
    pub model: String,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), model: model.into(), client: reqwest::Client::new() }
    }

    fn chat_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn complete(&self, req: ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = chat_body(&req, &self.model, false);
        let resp = self.client.post(self.chat_url()).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        Ok(parse_openai_response(&json, &self.model))
    }

    async fn complete_stream(&self, req: ChatRequest) -> Result<DeltaStream, LlmError> {
        let body = chat_body(&req, &self.model, true);
        let resp = self.client.post(self.chat_url()).json(&body).send().await?;
        open_sse_stream(resp).await
    }

    fn model_id(&self) -> &str { &self.model }
    fn is_local(&self) -> bool { true }
}

// ── 2. OpenAI-Compatible (OpenRouter, TogetherAI, Groq, HF router, vLLM, …) ──

pub struct OpenAiCompatibleBackend {
    pub base_url: String,
    pub model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(k) => req.bearer_auth(k),
            None    => req,
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    async fn complete(&self, req: ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = chat_body(&req, &self.model, false);
        let resp = self.auth(self.client.post(self.chat_url())).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        Ok(parse_openai_response(&json, &self.model))
    }

    async fn complete_stream(&self, req: ChatRequest) -> Result<DeltaStream, LlmError> {
        let body = chat_body(&req, &self.model, true);
        let resp = self.auth(self.client.post(self.chat_url())).json(&body).send().await?;
        open_sse_stream(resp).await
    }

    fn model_id(&self) -> &str { &self.model }
    fn is_local(&self) -> bool { false }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
