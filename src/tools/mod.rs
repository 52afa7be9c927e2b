//! Tool Registry (spec §4.1): declarative catalogue of callable tools with
//! typed parameter schemas, an execution dispatcher, per-tool error
//! policy, and a secrecy classification.

pub mod builtin;
pub mod schema;

use crate::billing::Billing;
use crate::config::OrchestratorConfig;
use crate::kb::KnowledgeBase;
use crate::llm::LlmClient;
use crate::objectstore::ObjectStore;
use crate::party::PartyStore;
use crate::store::CaseStore;
use crate::ticketing::Ticketing;
use async_trait::async_trait;
use schema::FieldSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Error taxonomy shared by tools (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    InvalidInput,
    NotFound,
    Unauthorized,
    TransientBackend,
    PermanentBackend,
    QuotaExceeded,
    Timeout,
}

impl ToolErrorKind {
    pub fn retriable(self) -> bool {
        matches!(self, Self::TransientBackend | Self::Timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl From<crate::error::Error> for ToolError {
    fn from(e: crate::error::Error) -> Self {
        use crate::error::Error::*;
        let kind = match &e {
            Validation { .. } => ToolErrorKind::InvalidInput,
            Authorization { .. } => ToolErrorKind::Unauthorized,
            NotFound { .. } => ToolErrorKind::NotFound,
            TransientBackend { .. } => ToolErrorKind::TransientBackend,
            PermanentBackend { .. } | PiiViolation { .. } => ToolErrorKind::PermanentBackend,
            _ => ToolErrorKind::PermanentBackend,
        };
        ToolError::new(kind, e.to_string())
    }
}

/// Normalized tool result: `{ok, value} | {err, kind, message, retriable}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Ok { value: serde_json::Value },
    Err { kind: ToolErrorKind, message: String, retriable: bool },
}

impl ToolOutcome {
    pub fn ok(value: serde_json::Value) -> Self {
        Self::Ok { value }
    }

    pub fn err(err: ToolError) -> Self {
        let retriable = err.kind.retriable();
        Self::Err { kind: err.kind, message: err.message, retriable }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

/// `{name, parameter_schema, result_schema, error_taxonomy, pii_capable,
/// idempotent}` (spec §3 Tool Descriptor).
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub parameter_schema: Vec<FieldSpec>,
    pub result_schema: Vec<FieldSpec>,
    pub error_taxonomy: Vec<ToolErrorKind>,
    pub pii_capable: bool,
    pub idempotent: bool,
}

/// Collaborators a tool may reach, scoped to one request.
pub struct ToolContext {
    pub case_id: String,
    pub case_store: Arc<dyn CaseStore>,
    pub party_store: Arc<dyn PartyStore>,
    pub kb: Arc<dyn KnowledgeBase>,
    pub billing: Arc<dyn Billing>,
    pub ticketing: Arc<dyn Ticketing>,
    pub objectstore: Arc<dyn ObjectStore>,
    pub reasoner: Arc<dyn LlmClient>,
    pub config: Arc<OrchestratorConfig>,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;
    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> ToolOutcome;
}

/// Declarative catalogue with parameter validation before dispatch.
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.descriptor().name, tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name).map(|t| t.descriptor())
    }

    pub async fn dispatch(&self, name: &str, params: serde_json::Value, ctx: &ToolContext) -> ToolOutcome {
        let Some(tool) = self.tools.get(name) else {
            return ToolOutcome::err(ToolError::new(ToolErrorKind::NotFound, format!("unknown tool {name}")));
        };
        if let Err(e) = schema::validate_params(&tool.descriptor().parameter_schema, &params) {
            return ToolOutcome::err(ToolError::new(ToolErrorKind::InvalidInput, e));
        }
        tool.execute(params, ctx).await
    }

    pub fn default_with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool(ToolDescriptor);

    #[async_trait]
    impl Tool for EchoTool {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.0
        }

        async fn execute(&self, params: serde_json::Value, _ctx: &ToolContext) -> ToolOutcome {
            ToolOutcome::ok(params)
        }
    }

    #[test]
    fn dispatch_rejects_unknown_tool_by_name() {
        let registry = ToolRegistry::new();
        // No context needed for the not-found path; build a runtime for the async call.
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let ctx = test_ctx();
        let outcome = rt.block_on(registry.dispatch("nope", serde_json::json!({}), &ctx));
        assert!(matches!(outcome, ToolOutcome::Err { kind: ToolErrorKind::NotFound, .. }));
    }

    fn test_ctx() -> ToolContext {
        ToolContext {
            case_id: "c1".into(),
            case_store: Arc::new(crate::store::SqliteCaseStore::in_memory().unwrap()),
            party_store: Arc::new(crate::party::SqlitePartyStore::in_memory().unwrap()),
            kb: Arc::new(crate::kb::FakeKnowledgeBase { records: vec![] }),
            billing: Arc::new(crate::billing::FakeBilling::new()),
            ticketing: Arc::new(crate::ticketing::FakeTicketing::new()),
            objectstore: Arc::new(crate::objectstore::FakeObjectStore::new()),
            reasoner: Arc::new(crate::llm::ReasonerClient::new(crate::llm::ClientConfig::new("k", "m")).unwrap()),
            config: Arc::new(OrchestratorConfig::default()),
        }
    }

    #[test]
    fn dispatch_validates_parameters_before_execute() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool(ToolDescriptor {
            name: "echo",
            parameter_schema: vec![FieldSpec::new("text", schema::FieldType::String)],
            result_schema: vec![],
            error_taxonomy: vec![ToolErrorKind::InvalidInput],
            pii_capable: false,
            idempotent: true,
        })));
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let ctx = test_ctx();
        let outcome = rt.block_on(registry.dispatch("echo", serde_json::json!({}), &ctx));
        assert!(matches!(outcome, ToolOutcome::Err { kind: ToolErrorKind::InvalidInput, .. }));
    }
}
