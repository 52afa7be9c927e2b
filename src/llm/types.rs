//! Message and request/response shapes shared by the Assistant and Reasoner
//! clients (spec §4.3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Tool, content: content.into() }
    }

    /// Rough token estimate (content length / 4), as the teacher's
    /// `Message::approx_tokens` does — good enough for budget checks, not
    /// billing.
    pub fn approx_tokens(&self) -> usize {
        self.content.len() / 4
    }
}

/// A tool call the Assistant requests the registry to dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

/// What the Assistant produced for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompletionOutput {
    Text { text: String },
    ToolCalls { tool_calls: Vec<ToolCall> },
}

/// Request body shared by both clients; `tools` is populated only for the
/// Assistant.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Option<Vec<crate::tools::schema::FieldSpec>>,
    pub session_id: Option<String>,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages,
            tools: None,
            session_id: None,
            max_tokens: 4096,
        }
    }

    pub fn with_tools(mut self, tools: Vec<crate::tools::schema::FieldSpec>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn approx_prompt_bytes(&self) -> usize {
        self.system_prompt.len() + self.messages.iter().map(|m| m.content.len()).sum::<usize>()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub output: CompletionOutput,
    pub usage: TokenUsage,
}
