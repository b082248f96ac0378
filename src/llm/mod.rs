//! C11 — LLM client boundary (spec §4.11).
//!
//! A minimal async trait standing in for the model call inside the loop.
//! The teacher drives a full `goose` agent/provider stack for planning and
//! review (`src/phases/agent_utils.rs`'s `ProviderConfig`/`create_provider`);
//! that stack is MCP- and extension-oriented and doesn't fit a scheduler
//! that just needs "send messages + tool specs, get back a message + tool
//! calls". This module keeps the teacher's provider/model override
//! pattern (`ProviderConfig`) but narrows the surface to one `chat` call.

mod json_utils;

pub use json_utils::extract_json_block;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Provider/model selection, mirroring the teacher's override-then-default
/// resolution order (`ProviderConfig`): explicit override, else a
/// component default.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: String,
    pub model: String,
}

impl ProviderConfig {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self { provider: provider.into(), model: model.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Present on a `Tool`-role message: which call this is the result of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into(), tool_call_id: None }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), tool_call_id: None }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), tool_call_id: None }
    }
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: Role::Tool, content: content.into(), tool_call_id: Some(tool_call_id.into()) }
    }
}

/// One named tool the model may call, carrying its JSON-schema argument
/// shape (the same `schemars::Schema` the shell layer validates against,
/// spec §4.5).
#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub parameters: schemars::Schema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    MaxTokens,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request cancelled")]
    Cancelled,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(
        &self,
        config: &ProviderConfig,
        messages: &[Message],
        tools: &[ToolDef],
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, LlmError>;
}

/// Documents the OpenAI-compatible wire shape this crate would speak if it
/// made a real HTTP call. No network dependency is carried for it (spec's
/// scheduling model has no network-I/O requirement inside a gate or the
/// chat call's unit tests); wiring a concrete provider is left to the host
/// embedding this crate, the same way the teacher's `create_with_named_model`
/// resolves to different provider crates at runtime.
pub struct HttpLlmClient {
    pub base_url: String,
    pub api_key: String,
}

impl HttpLlmClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), api_key: api_key.into() }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn chat(
        &self,
        _config: &ProviderConfig,
        _messages: &[Message],
        _tools: &[ToolDef],
        _cancel: &CancellationToken,
    ) -> Result<ChatResponse, LlmError> {
        Err(LlmError::Transport(
            "HttpLlmClient has no network transport configured in this build".to_string(),
        ))
    }
}

/// Scripted test double: returns the next response in sequence, or errors
/// once exhausted. Observes `cancel` the way a real streaming client would.
pub struct MockLlmClient {
    responses: std::sync::Mutex<std::collections::VecDeque<ChatResponse>>,
}

impl MockLlmClient {
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self { responses: std::sync::Mutex::new(responses.into_iter().collect()) }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat(
        &self,
        _config: &ProviderConfig,
        _messages: &[Message],
        _tools: &[ToolDef],
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, LlmError> {
        if cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Transport("MockLlmClient exhausted".to_string()))
    }
}
