//! consult-reasoner (spec §4.4): hands the case digest to the Reasoner via
//! the `consult_reasoner` tool, logs its response, and routes back to plan.
//! A `purpose: "prune"` invocation additionally demotes the oldest
//! `considered` legislation entries to `irrelevant` instead of letting the
//! prune threshold fire again next plan cycle.

use super::{context_digest, Node, NodeContext};
use crate::case::context::ResearchStatus;
use crate::error::Error;
use crate::orchestrator::NodeResult;
use crate::store::Update;
use crate::tools::ToolOutcome;
use async_trait::async_trait;
use serde_json::json;

pub struct ConsultReasonerNode;

#[async_trait]
impl Node for ConsultReasonerNode {
    fn name(&self) -> &'static str {
        "consult_reasoner"
    }

    async fn run(&self, nc: &mut NodeContext<'_>) -> NodeResult {
        let purpose = nc.inputs.get("purpose").and_then(|v| v.as_str()).unwrap_or("review_research").to_string();
        let question = match purpose.as_str() {
            "prune" => {
                "Lista de legislatie considerata a depasit pragul. Rezuma ce ramane relevant pentru caz.".to_string()
            }
            _ => "Analizeaza cercetarea juridica adunata pana acum si recomanda urmatorul pas.".to_string(),
        };

        let params = json!({
            "case_id": nc.case_id,
            "synthesized_context": context_digest(nc),
            "question": question,
        });

        let outcome = nc.tools.dispatch("consult_reasoner", params, nc.tool_ctx).await;
        let response = match outcome {
            ToolOutcome::Ok { value } => value.get("response").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            ToolOutcome::Err { message, retriable, .. } => {
                return NodeResult::Error(if retriable {
                    Error::transient_backend("reasoner", message)
                } else {
                    Error::permanent_backend("reasoner", message)
                });
            }
        };

        let mut updates = vec![Update::append("internal_notes", json!(response))];

        if purpose == "prune" {
            let demoted_ids: std::collections::HashSet<&str> = nc
                .context
                .legal_research
                .legislation
                .iter()
                .filter(|r| r.status == ResearchStatus::Considered)
                .take(nc.config.consideration_prune_threshold as usize)
                .map(|r| r.doc_id.as_str())
                .collect();

            if !demoted_ids.is_empty() {
                let remaining: Vec<serde_json::Value> = nc
                    .context
                    .legal_research
                    .legislation
                    .iter()
                    .cloned()
                    .map(|mut r| {
                        if demoted_ids.contains(r.doc_id.as_str()) {
                            r.status = ResearchStatus::Irrelevant;
                        }
                        serde_json::to_value(r).unwrap_or(json!({}))
                    })
                    .collect();
                updates.push(Update::replace("legal_research.legislation", json!(remaining)));
            }
        }

        if let Err(e) = nc.tool_ctx.case_store.apply_updates(nc.case_id, &updates) {
            return NodeResult::Error(e);
        }

        NodeResult::Continue { next_node: "plan".into(), inputs: json!({}) }
    }
}
