//! Assistant and Reasoner LLM clients (spec §4.3).
//!
//! Both clients share a single *generate* contract and target an
//! Anthropic-Messages-API-shaped backend (SPEC_FULL.md §C.4). They differ
//! only in whether a tool schema may be attached to the request: the
//! Assistant supports tool-call outputs, the Reasoner returns text only.

use crate::config::OrchestratorConfig;
use crate::error::{Error, Result};
use crate::llm::redaction;
use crate::llm::types::{CompletionOutput, CompletionRequest, CompletionResponse, TokenUsage, ToolCall};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client construction options, mirroring the teacher's `ClientConfig`
/// builder.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com".to_string(),
            model: model.into(),
            timeout_secs: 60,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    // Some sandboxed environments panic inside reqwest's platform proxy
    // detection; fall back to a proxy-less client rather than propagate.
    let build = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs)).build()
    }));
    match build {
        Ok(Ok(client)) => Ok(client),
        _ => reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::internal(format!("building http client: {e}"))),
    }
}

/// Generate contract shared by the Assistant and Reasoner clients.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Human-readable name used in error messages and log spans.
    fn provider_name(&self) -> &'static str;

    /// Whether this client is permitted to emit tool calls.
    fn supports_tools(&self) -> bool;

    async fn generate_raw(&self, request: &CompletionRequest) -> Result<CompletionResponse>;

    /// Run the redaction check, then `generate_raw` with bounded retries on
    /// transient failures (spec §4.3: 3 attempts, exponential backoff).
    async fn generate(
        &self,
        request: CompletionRequest,
        attached_party_values: &[&str],
        config: &OrchestratorConfig,
    ) -> Result<CompletionResponse> {
        if !self.supports_tools() && request.tools.is_some() {
            return Err(Error::validation(format!(
                "{} does not support tool schemas",
                self.provider_name()
            )));
        }

        let mut texts: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
        texts.push(request.system_prompt.as_str());
        redaction::redaction_check(&texts, attached_party_values)?;

        let mut attempt = 0u32;
        loop {
            match self.generate_raw(&request).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_retriable() && attempt < config.retry_attempts_transient => {
                    tracing::warn!(provider = self.provider_name(), attempt, error = %e, "retrying transient llm failure");
                    tokio::time::sleep(config.backoff_for_attempt(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// --- Anthropic wire format -------------------------------------------------

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Deserialize, Default)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: serde_json::Value },
}

#[derive(Deserialize)]
struct AnthropicErrorBody {
    error: AnthropicErrorDetail,
}

#[derive(Deserialize)]
struct AnthropicErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

async fn call_anthropic(http: &reqwest::Client, cfg: &ClientConfig, req: &CompletionRequest) -> Result<CompletionResponse> {
    let messages: Vec<AnthropicMessage> = req
        .messages
        .iter()
        .map(|m| AnthropicMessage {
            role: match m.role {
                crate::llm::types::ChatRole::Assistant => "assistant".to_string(),
                _ => "user".to_string(),
            },
            content: m.content.clone(),
        })
        .collect();

    let tools = req.tools.as_ref().map(|fields| {
        fields
            .iter()
            .map(|f| serde_json::json!({"name": f.name, "description": f.description, "input_schema": f.field_type.to_json_schema()}))
            .collect()
    });

    let body = AnthropicRequest {
        model: &cfg.model,
        max_tokens: req.max_tokens,
        system: &req.system_prompt,
        messages,
        tools,
    };

    let resp = http
        .post(format!("{}/v1/messages", cfg.base_url))
        .header("x-api-key", &cfg.api_key)
        .header("anthropic-version", "2023-06-01")
        .json(&body)
        .send()
        .await
        .map_err(|e| Error::transient_backend("anthropic", e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        let parsed: Option<AnthropicErrorBody> = serde_json::from_str(&text).ok();
        let message = parsed.map(|b| b.error.message).unwrap_or(text);
        return if status.as_u16() == 429 || status.is_server_error() {
            Err(Error::transient_backend("anthropic", message))
        } else {
            Err(Error::permanent_backend("anthropic", message))
        };
    }

    let parsed: AnthropicResponse = resp
        .json()
        .await
        .map_err(|e| Error::permanent_backend("anthropic", format!("decoding response: {e}")))?;

    let mut tool_calls = Vec::new();
    let mut text = String::new();
    for block in parsed.content {
        match block {
            AnthropicContentBlock::Text { text: t } => text.push_str(&t),
            AnthropicContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall { id, tool_name: name, arguments: input });
            }
        }
    }

    let output = if tool_calls.is_empty() {
        CompletionOutput::Text { text }
    } else {
        CompletionOutput::ToolCalls { tool_calls }
    };

    Ok(CompletionResponse {
        output,
        usage: TokenUsage { input_tokens: parsed.usage.input_tokens, output_tokens: parsed.usage.output_tokens },
    })
}

/// User-facing, tool-calling, drafting model.
pub struct AssistantClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl AssistantClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self { http: build_http_client(config.timeout_secs)?, config })
    }
}

#[async_trait]
impl LlmClient for AssistantClient {
    fn provider_name(&self) -> &'static str {
        "assistant"
    }

    fn supports_tools(&self) -> bool {
        true
    }

    async fn generate_raw(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        call_anthropic(&self.http, &self.config, request).await
    }
}

/// Strategy, validation, draft-planning model. Text-only.
pub struct ReasonerClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ReasonerClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self { http: build_http_client(config.timeout_secs)?, config })
    }
}

#[async_trait]
impl LlmClient for ReasonerClient {
    fn provider_name(&self) -> &'static str {
        "reasoner"
    }

    fn supports_tools(&self) -> bool {
        false
    }

    async fn generate_raw(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        call_anthropic(&self.http, &self.config, request).await
    }
}

/// Deterministic stand-in for node/orchestrator tests: returns queued
/// responses in order instead of calling out to a real backend.
pub struct ScriptedLlmClient {
    name: &'static str,
    supports_tools: bool,
    responses: std::sync::Mutex<std::collections::VecDeque<CompletionResponse>>,
}

impl ScriptedLlmClient {
    pub fn new(name: &'static str, supports_tools: bool, responses: Vec<CompletionResponse>) -> Self {
        Self {
            name,
            supports_tools,
            responses: std::sync::Mutex::new(responses.into_iter().collect()),
        }
    }

    pub fn text(name: &'static str, supports_tools: bool, texts: Vec<&str>) -> Self {
        Self::new(
            name,
            supports_tools,
            texts
                .into_iter()
                .map(|t| CompletionResponse {
                    output: CompletionOutput::Text { text: t.to_string() },
                    usage: TokenUsage::default(),
                })
                .collect(),
        )
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn provider_name(&self) -> &'static str {
        self.name
    }

    fn supports_tools(&self) -> bool {
        self.supports_tools
    }

    async fn generate_raw(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::internal(format!("{} has no scripted response left", self.name)))
    }
}
