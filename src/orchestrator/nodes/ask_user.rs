//! ask-user (spec §4.4): formulates one question for the user and suspends
//! the request until they reply.

use super::{context_digest, generate_text, Node, NodeContext};
use crate::orchestrator::NodeResult;
use crate::store::Update;
use async_trait::async_trait;
use serde_json::json;

pub struct AskUserNode;

#[async_trait]
impl Node for AskUserNode {
    fn name(&self) -> &'static str {
        "ask_user"
    }

    async fn run(&self, nc: &mut NodeContext<'_>) -> NodeResult {
        let request = crate::llm::CompletionRequest::new(
            "Esti coordonatorul unui dosar juridic. Formuleaza O SINGURA intrebare clara, in limba romana, \
             care il ajuta pe utilizator sa ofere informatia care lipseste pentru a avansa cazul.",
            vec![crate::llm::ChatMessage::user(context_digest(nc))],
        );

        let question = match generate_text(nc, nc.assistant, request).await {
            Ok(t) => t,
            Err(e) => return NodeResult::Error(e),
        };

        let updates = vec![Update::replace("agent_interactions.active_info_request_to_user", json!(question))];
        if let Err(e) = nc.tool_ctx.case_store.apply_updates(nc.case_id, &updates) {
            return NodeResult::Error(e);
        }

        NodeResult::Suspend {
            reason: "awaiting_user_reply".into(),
            resume_node: "plan".into(),
            resume_inputs: json!({}),
            message: Some(question),
        }
    }
}
