//! update-context (spec §4.4): applies a batch of case-memory updates
//! (e.g. distilled facts, objective status changes) with no user-facing
//! output, then always returns to plan.

use super::{Node, NodeContext};
use crate::orchestrator::NodeResult;
use async_trait::async_trait;
use serde_json::json;

pub struct UpdateContextNode;

#[async_trait]
impl Node for UpdateContextNode {
    fn name(&self) -> &'static str {
        "update_context"
    }

    async fn run(&self, nc: &mut NodeContext<'_>) -> NodeResult {
        let has_updates = nc.inputs.get("updates").and_then(|v| v.as_object()).is_some_and(|m| !m.is_empty());
        if has_updates {
            let updates = nc.inputs["updates"].clone();
            let params = json!({"case_id": nc.case_id, "updates": updates});
            let outcome = nc.tools.dispatch("update_case_context", params, nc.tool_ctx).await;
            if let crate::tools::ToolOutcome::Err { message, .. } = outcome {
                return NodeResult::Error(crate::error::Error::validation(message));
            }
        }
        NodeResult::Continue { next_node: "plan".into(), inputs: json!({}) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::FakeBilling;
    use crate::case::{Case, Owner};
    use crate::config::OrchestratorConfig;
    use crate::kb::FakeKnowledgeBase;
    use crate::llm::{ClientConfig, ReasonerClient, ScriptedLlmClient};
    use crate::objectstore::FakeObjectStore;
    use crate::party::SqlitePartyStore;
    use crate::store::SqliteCaseStore;
    use crate::ticketing::FakeTicketing;
    use crate::tools::ToolRegistry;
    use std::sync::Arc;

    #[tokio::test]
    async fn a_real_update_is_applied_and_the_loop_returns_to_plan() {
        let case_store = Arc::new(SqliteCaseStore::in_memory().unwrap());
        case_store.create_case(&Case::new("c1", Owner::Individual { user_id: "u1".into() })).unwrap();

        let tool_ctx = crate::tools::ToolContext {
            case_id: "c1".into(),
            case_store: case_store.clone(),
            party_store: Arc::new(SqlitePartyStore::in_memory().unwrap()),
            kb: Arc::new(FakeKnowledgeBase { records: vec![] }),
            billing: Arc::new(FakeBilling::new()),
            ticketing: Arc::new(FakeTicketing::new()),
            objectstore: Arc::new(FakeObjectStore::new()),
            reasoner: Arc::new(ReasonerClient::new(ClientConfig::new("k", "m")).unwrap()),
            config: Arc::new(OrchestratorConfig::default()),
        };

        let tools = ToolRegistry::default_with_builtins();
        let assistant = ScriptedLlmClient::text("assistant", true, vec![]);
        let mut scratchpad = json!({});
        let config = tool_ctx.config.clone();
        let snapshot = case_store.load("c1").unwrap();
        let mut nc = NodeContext {
            case_id: "c1",
            case: &snapshot.case,
            context: &snapshot.context,
            inputs: json!({"updates": {"summary.current": {"value": "Client a confirmat primirea notificarii."}}}),
            scratchpad: &mut scratchpad,
            tools: &tools,
            tool_ctx: &tool_ctx,
            assistant: &assistant,
            config: &config,
        };

        let result = UpdateContextNode.run(&mut nc).await;
        assert!(matches!(result, NodeResult::Continue { ref next_node, .. } if next_node == "plan"));
        let updated = case_store.load("c1").unwrap();
        assert_eq!(updated.context.summary.current, "Client a confirmat primirea notificarii.");
    }

    #[tokio::test]
    async fn an_empty_updates_map_skips_the_tool_call() {
        let case_store = Arc::new(SqliteCaseStore::in_memory().unwrap());
        case_store.create_case(&Case::new("c1", Owner::Individual { user_id: "u1".into() })).unwrap();

        let tool_ctx = crate::tools::ToolContext {
            case_id: "c1".into(),
            case_store: case_store.clone(),
            party_store: Arc::new(SqlitePartyStore::in_memory().unwrap()),
            kb: Arc::new(FakeKnowledgeBase { records: vec![] }),
            billing: Arc::new(FakeBilling::new()),
            ticketing: Arc::new(FakeTicketing::new()),
            objectstore: Arc::new(FakeObjectStore::new()),
            reasoner: Arc::new(ReasonerClient::new(ClientConfig::new("k", "m")).unwrap()),
            config: Arc::new(OrchestratorConfig::default()),
        };

        let tools = ToolRegistry::default_with_builtins();
        let assistant = ScriptedLlmClient::text("assistant", true, vec![]);
        let mut scratchpad = json!({});
        let config = tool_ctx.config.clone();
        let snapshot = case_store.load("c1").unwrap();
        let log_before = snapshot.context.agent_interactions.log.len();
        let mut nc = NodeContext {
            case_id: "c1",
            case: &snapshot.case,
            context: &snapshot.context,
            inputs: json!({"updates": {}}),
            scratchpad: &mut scratchpad,
            tools: &tools,
            tool_ctx: &tool_ctx,
            assistant: &assistant,
            config: &config,
        };

        let result = UpdateContextNode.run(&mut nc).await;
        assert!(matches!(result, NodeResult::Continue { ref next_node, .. } if next_node == "plan"));
        let after = case_store.load("c1").unwrap();
        assert_eq!(after.context.agent_interactions.log.len(), log_before);
    }
}
