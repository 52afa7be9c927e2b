//! tier-decide (spec §4.4): classifies tier from the user's initial
//! description and records it. Does not itself change case status — that
//! is quota-check's job once a tier is known.

use super::{generate_text, Node, NodeContext};
use crate::orchestrator::{NodeResult, ReplyMetadata};
use async_trait::async_trait;
use serde_json::json;

pub struct TierDecideNode;

#[async_trait]
impl Node for TierDecideNode {
    fn name(&self) -> &'static str {
        "tier_decide"
    }

    async fn run(&self, nc: &mut NodeContext<'_>) -> NodeResult {
        let description = nc.inputs.get("user_message").and_then(|v| v.as_str()).unwrap_or("").trim().to_string();
        if description.is_empty() {
            return NodeResult::Reply {
                text: "Va rog descrieti pe scurt problema juridica pentru care aveti nevoie de ajutor.".into(),
                metadata: ReplyMetadata::default(),
            };
        }

        let hint = crate::complexity::TierClassifier::hint(&description);

        let request = crate::llm::CompletionRequest::new(
            "Esti un asistent juridic care estimeaza complexitatea unui caz pe o scara de 3 niveluri \
             (1=simplu, 2=mediu, 3=complex). Raspunde STRICT cu JSON de forma \
             {\"tier\": 1|2|3, \"justification\": \"...\"}.",
            vec![crate::llm::ChatMessage::user(format!(
                "Descrierea cazului: {description}\n\nIndiciu euristic (nu autoritativ): tier {} ({})",
                hint.tier, hint.reason
            ))],
        );

        let text = match generate_text(nc, nc.assistant, request).await {
            Ok(t) => t,
            Err(e) => return NodeResult::Error(e),
        };
        let tier = parse_tier(&text).unwrap_or(hint.tier);

        if let Err(e) = nc.tool_ctx.case_store.set_tier(nc.case_id, tier) {
            return NodeResult::Error(e);
        }

        let updates = vec![
            crate::store::Update::replace("summary.current", json!(description)),
            crate::store::Update::append(
                "objectives",
                json!({"objective": "stabilire plan de actiune pentru caz", "status": "pending"}),
            ),
        ];
        if let Err(e) = nc.tool_ctx.case_store.apply_updates(nc.case_id, &updates) {
            return NodeResult::Error(e);
        }

        NodeResult::Continue { next_node: "quota_check".into(), inputs: json!({"tier": tier}) }
    }
}

fn parse_tier(text: &str) -> Option<u8> {
    let value: serde_json::Value = serde_json::from_str(text.trim()).ok()?;
    let tier = value.get("tier")?.as_u64()?;
    (1..=3).contains(&tier).then_some(tier as u8)
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

    fn ctx(case_id: &str) -> (Arc<SqliteCaseStore>, crate::tools::ToolContext) {
        let case_store = Arc::new(SqliteCaseStore::in_memory().unwrap());
        case_store.create_case(&Case::new(case_id, Owner::Individual { user_id: "u1".into() })).unwrap();
        let tool_ctx = crate::tools::ToolContext {
            case_id: case_id.into(),
            case_store: case_store.clone(),
            party_store: Arc::new(SqlitePartyStore::in_memory().unwrap()),
            kb: Arc::new(FakeKnowledgeBase { records: vec![] }),
            billing: Arc::new(FakeBilling::new()),
            ticketing: Arc::new(FakeTicketing::new()),
            objectstore: Arc::new(FakeObjectStore::new()),
            reasoner: Arc::new(ReasonerClient::new(ClientConfig::new("k", "m")).unwrap()),
            config: Arc::new(OrchestratorConfig::default()),
        };
        (case_store, tool_ctx)
    }

    #[tokio::test]
    async fn records_tier_and_continues_to_quota_check() {
        let (case_store, tool_ctx) = ctx("c1");
        let tools = ToolRegistry::default_with_builtins();
        let assistant = ScriptedLlmClient::text("assistant", true, vec![r#"{"tier": 2, "justification": "clauza contractuala"}"#]);
        let mut scratchpad = json!({});
        let config = tool_ctx.config.clone();
        let snapshot = case_store.load("c1").unwrap();
        let mut nc = NodeContext {
            case_id: "c1",
            case: &snapshot.case,
            context: &snapshot.context,
            inputs: json!({"user_message": "Am o problema cu o clauza din contract."}),
            scratchpad: &mut scratchpad,
            tools: &tools,
            tool_ctx: &tool_ctx,
            assistant: &assistant,
            config: &config,
        };

        let result = TierDecideNode.run(&mut nc).await;
        match result {
            NodeResult::Continue { next_node, inputs } => {
                assert_eq!(next_node, "quota_check");
                assert_eq!(inputs["tier"], json!(2));
            }
            _ => panic!("expected Continue"),
        }
        assert_eq!(case_store.load("c1").unwrap().case.tier, Some(2));
    }

    #[tokio::test]
    async fn empty_description_asks_for_one_instead_of_calling_the_assistant() {
        let (case_store, tool_ctx) = ctx("c2");
        let tools = ToolRegistry::default_with_builtins();
        let assistant = ScriptedLlmClient::text("assistant", true, vec![]);
        let mut scratchpad = json!({});
        let config = tool_ctx.config.clone();
        let snapshot = case_store.load("c2").unwrap();
        let mut nc = NodeContext {
            case_id: "c2",
            case: &snapshot.case,
            context: &snapshot.context,
            inputs: json!({"user_message": "   "}),
            scratchpad: &mut scratchpad,
            tools: &tools,
            tool_ctx: &tool_ctx,
            assistant: &assistant,
            config: &config,
        };
        assert!(matches!(TierDecideNode.run(&mut nc).await, NodeResult::Reply { .. }));
    }
}
