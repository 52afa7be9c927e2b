//! LLM Client Pair (spec §4.3): Assistant (tool-capable) and Reasoner
//! (text-only), sharing a common generate contract and redaction gate.

pub mod client;
pub mod redaction;
pub mod types;

pub use client::{AssistantClient, ClientConfig, LlmClient, ReasonerClient, ScriptedLlmClient};
pub use types::{ChatMessage, ChatRole, CompletionOutput, CompletionRequest, CompletionResponse, TokenUsage, ToolCall};
