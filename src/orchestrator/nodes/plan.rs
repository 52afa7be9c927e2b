//! plan (spec §4.4): the Assistant proposes candidate actions; a fixed
//! tie-break order picks the one the orchestrator actually takes.
//! `done` is only legal once every objective is non-pending, and a run of
//! `research` past the prune threshold is redirected straight to
//! `consult_reasoner` instead of repeating.

use super::{context_digest_checked, generate_text, Node, NodeContext};
use crate::orchestrator::{NodeResult, ReplyMetadata};
use async_trait::async_trait;
use serde_json::json;

const PRIORITY: [&str; 6] = ["ask_user", "research", "consult_reasoner", "draft", "update_only", "done"];

pub struct PlanNode;

#[async_trait]
impl Node for PlanNode {
    fn name(&self) -> &'static str {
        "plan"
    }

    async fn run(&self, nc: &mut NodeContext<'_>) -> NodeResult {
        let considered = nc.context.legal_research.considered_legislation_count() as u32;
        let last_action_was_research = nc.scratchpad.get("last_action").and_then(|v| v.as_str()) == Some("research");
        if considered >= nc.config.consideration_prune_threshold && last_action_was_research {
            return NodeResult::Continue { next_node: "consult_reasoner".into(), inputs: json!({"purpose": "prune"}) };
        }

        let digest = match context_digest_checked(nc) {
            Ok(d) => d,
            Err(e) => return NodeResult::Error(e),
        };

        let request = crate::llm::CompletionRequest::new(
            "Esti coordonatorul unui dosar juridic. Alege una sau mai multe actiuni candidate din multimea \
             {ask_user, research, consult_reasoner, draft, update_only, done}. `done` este valid doar daca \
             toate obiectivele sunt rezolvate. Daca alegi `update_only`, include si campul `updates`: o map de \
             la cale punctata la {\"value\": ..., \"replace\": bool}, cu actualizarile de aplicat direct asupra \
             memoriei cazului (fapte noi, stare obiective etc). Raspunde STRICT cu JSON de forma \
             {\"candidate_actions\": [...], \"updates\": {...}, \"reason\": \"...\"}.",
            vec![crate::llm::ChatMessage::user(digest)],
        );

        let text = match generate_text(nc, nc.assistant, request).await {
            Ok(t) => t,
            Err(e) => return NodeResult::Error(e),
        };

        let candidates = parse_candidates(&text);
        let all_resolved = nc.context.all_objectives_resolved();

        let chosen = PRIORITY
            .iter()
            .find(|action| candidates.iter().any(|c| c == *action) && (**action != "done" || all_resolved))
            .copied()
            .unwrap_or(if all_resolved { "done" } else { "ask_user" });

        nc.scratchpad["last_action"] = json!(chosen);

        match chosen {
            "done" => NodeResult::Reply {
                text: "Toate obiectivele acestui caz au fost rezolvate. Va multumesc.".into(),
                metadata: ReplyMetadata::default(),
            },
            "update_only" => {
                let updates = parse_updates(&text);
                NodeResult::Continue { next_node: "update_context".into(), inputs: json!({"updates": updates}) }
            }
            other => NodeResult::Continue { next_node: other.into(), inputs: json!({}) },
        }
    }
}

fn parse_candidates(text: &str) -> Vec<String> {
    serde_json::from_str::<serde_json::Value>(text.trim())
        .ok()
        .and_then(|v| v.get("candidate_actions").cloned())
        .and_then(|v| v.as_array().map(|a| a.iter().filter_map(|x| x.as_str().map(String::from)).collect()))
        .unwrap_or_default()
}

/// The assistant's `updates` field for an `update_only` choice: a dot-path
/// map threaded straight into `update_context`'s tool call.
fn parse_updates(text: &str) -> serde_json::Value {
    serde_json::from_str::<serde_json::Value>(text.trim())
        .ok()
        .and_then(|v| v.get("updates").cloned())
        .filter(|v| v.is_object())
        .unwrap_or_else(|| json!({}))
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
    use crate::store::{SqliteCaseStore, Update};
    use crate::ticketing::FakeTicketing;
    use crate::tools::ToolRegistry;
    use std::sync::Arc;

    #[test]
    fn parses_candidate_actions_from_assistant_json() {
        let candidates = parse_candidates(r#"{"candidate_actions": ["ask_user", "draft"], "reason": "x"}"#);
        assert_eq!(candidates, vec!["ask_user", "draft"]);
    }

    #[test]
    fn parses_updates_for_an_update_only_choice() {
        let updates = parse_updates(
            r#"{"candidate_actions": ["update_only"], "updates": {"summary.current": {"value": "x"}}, "reason": "r"}"#,
        );
        assert_eq!(updates, json!({"summary.current": {"value": "x"}}));
    }

    #[test]
    fn missing_updates_field_yields_an_empty_map() {
        assert_eq!(parse_updates(r#"{"candidate_actions": ["update_only"], "reason": "r"}"#), json!({}));
    }

    #[test]
    fn unparsable_response_yields_no_candidates() {
        assert!(parse_candidates("not json").is_empty());
    }

    #[tokio::test]
    async fn an_undersized_budget_fails_loudly_instead_of_truncating() {
        let case_store = Arc::new(SqliteCaseStore::in_memory().unwrap());
        case_store.create_case(&Case::new("c1", Owner::Individual { user_id: "u1".into() })).unwrap();
        case_store
            .apply_updates(
                "c1",
                &[Update::replace("summary.current", json!("Un rezumat suficient de lung pentru a depasi bugetul minim."))],
            )
            .unwrap();

        let tool_ctx = crate::tools::ToolContext {
            case_id: "c1".into(),
            case_store: case_store.clone(),
            party_store: Arc::new(SqlitePartyStore::in_memory().unwrap()),
            kb: Arc::new(FakeKnowledgeBase { records: vec![] }),
            billing: Arc::new(FakeBilling::new()),
            ticketing: Arc::new(FakeTicketing::new()),
            objectstore: Arc::new(FakeObjectStore::new()),
            reasoner: Arc::new(ReasonerClient::new(ClientConfig::new("k", "m")).unwrap()),
            config: Arc::new(OrchestratorConfig { assistant_context_budget_bytes: 4, ..OrchestratorConfig::default() }),
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
            inputs: json!({}),
            scratchpad: &mut scratchpad,
            tools: &tools,
            tool_ctx: &tool_ctx,
            assistant: &assistant,
            config: &config,
        };

        let result = PlanNode.run(&mut nc).await;
        assert!(matches!(result, NodeResult::Error(crate::error::Error::Validation { .. })));
    }

    #[tokio::test]
    async fn crossing_the_prune_threshold_right_after_research_detours_to_consult_reasoner() {
        use crate::case::context::{ResearchRecord, ResearchStatus};
        use chrono::Utc;

        let case_store = Arc::new(SqliteCaseStore::in_memory().unwrap());
        case_store.create_case(&Case::new("c1", Owner::Individual { user_id: "u1".into() })).unwrap();

        let considered: Vec<serde_json::Value> = (0..20)
            .map(|i| {
                serde_json::to_value(ResearchRecord {
                    doc_id: format!("law-{i}"),
                    title: format!("Legea {i}"),
                    summary: "rezumat".into(),
                    full_text: None,
                    relevance: 0.5,
                    status: ResearchStatus::Considered,
                    fetched_at: Utc::now(),
                })
                .unwrap()
            })
            .collect();
        case_store
            .apply_updates("c1", &[Update::replace("legal_research.legislation", json!(considered))])
            .unwrap();

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
        let mut scratchpad = json!({"last_action": "research"});
        let config = tool_ctx.config.clone();
        let snapshot = case_store.load("c1").unwrap();
        let mut nc = NodeContext {
            case_id: "c1",
            case: &snapshot.case,
            context: &snapshot.context,
            inputs: json!({}),
            scratchpad: &mut scratchpad,
            tools: &tools,
            tool_ctx: &tool_ctx,
            assistant: &assistant,
            config: &config,
        };

        let result = PlanNode.run(&mut nc).await;
        assert!(matches!(
            result,
            NodeResult::Continue { ref next_node, ref inputs }
                if next_node == "consult_reasoner" && inputs.get("purpose").and_then(|v| v.as_str()) == Some("prune")
        ));
    }

    #[tokio::test]
    async fn choosing_update_only_threads_the_assistants_updates_into_update_context() {
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
        let assistant = ScriptedLlmClient::text(
            "assistant",
            true,
            vec![r#"{"candidate_actions": ["update_only"], "updates": {"summary.current": {"value": "Client a confirmat."}}, "reason": "r"}"#],
        );
        let mut scratchpad = json!({});
        let config = tool_ctx.config.clone();
        let snapshot = case_store.load("c1").unwrap();
        let mut nc = NodeContext {
            case_id: "c1",
            case: &snapshot.case,
            context: &snapshot.context,
            inputs: json!({}),
            scratchpad: &mut scratchpad,
            tools: &tools,
            tool_ctx: &tool_ctx,
            assistant: &assistant,
            config: &config,
        };

        let result = PlanNode.run(&mut nc).await;
        match result {
            NodeResult::Continue { next_node, inputs } => {
                assert_eq!(next_node, "update_context");
                assert_eq!(
                    inputs.get("updates").and_then(|v| v.get("summary.current")).and_then(|v| v.get("value")).and_then(|v| v.as_str()),
                    Some("Client a confirmat.")
                );
            }
            _ => panic!("expected a continue to update_context carrying real update content"),
        }
    }
}
