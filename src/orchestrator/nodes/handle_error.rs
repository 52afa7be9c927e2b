//! handle-error (spec §4.4, §7): the escalation ladder every `NodeResult::
//! Error` routes through. PII/validation/authorization/not-found skip the
//! ladder entirely and report back immediately; retriable failures get a
//! couple of plain retries, then one reasoner-assisted retry, then an
//! `ask_user`-style suspension, then a human support ticket.
//!
//! `escalation_stage` lives in the scratchpad, not the persisted case
//! document: it resets to zero whenever a request suspends and a later one
//! resumes, by design — a brand new request gets a fresh ladder rather
//! than inheriting an old failure's stage count.

use super::{Node, NodeContext};
use crate::orchestrator::{NodeResult, ReplyMetadata};
use crate::tools::ToolOutcome;
use async_trait::async_trait;
use serde_json::json;

const SKIP_LADDER: &[&str] = &["pii_violation", "validation", "authorization", "not_found"];
const MAX_PLAIN_RETRIES: u64 = 2;

pub struct HandleErrorNode;

#[async_trait]
impl Node for HandleErrorNode {
    fn name(&self) -> &'static str {
        "handle_error"
    }

    async fn run(&self, nc: &mut NodeContext<'_>) -> NodeResult {
        let error_kind = nc.inputs.get("error_kind").and_then(|v| v.as_str()).unwrap_or("internal").to_string();
        let error_message = nc.inputs.get("error_message").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let failing_node = nc.inputs.get("failing_node").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let failing_inputs = nc.inputs.get("failing_inputs").cloned().unwrap_or(json!({}));
        let retriable = nc.inputs.get("retriable").and_then(|v| v.as_bool()).unwrap_or(false);

        if SKIP_LADDER.contains(&error_kind.as_str()) {
            nc.scratchpad["escalation_stage"] = json!(0);
            return NodeResult::Reply {
                text: sanitized_reply(&error_kind),
                metadata: ReplyMetadata::default(),
            };
        }

        let stage = nc.scratchpad.get("escalation_stage").and_then(|v| v.as_u64()).unwrap_or(0);
        nc.scratchpad["escalation_stage"] = json!(stage + 1);

        if retriable && stage < MAX_PLAIN_RETRIES {
            return NodeResult::Continue { next_node: failing_node, inputs: failing_inputs };
        }

        if retriable && stage == MAX_PLAIN_RETRIES {
            let params = json!({
                "case_id": nc.case_id,
                "synthesized_context": format!("Nodul '{failing_node}' a esuat in mod repetat cu eroarea: {error_message}"),
                "question": "Cum ar trebui sa procedam pentru a recupera acest pas?",
            });
            let outcome = nc.tools.dispatch("consult_reasoner", params, nc.tool_ctx).await;
            if let ToolOutcome::Ok { .. } = outcome {
                return NodeResult::Continue { next_node: failing_node, inputs: failing_inputs };
            }
        }

        if stage <= MAX_PLAIN_RETRIES + 1 {
            return NodeResult::Suspend {
                reason: "error_needs_user_input".into(),
                resume_node: failing_node,
                resume_inputs: failing_inputs,
                message: Some(
                    "Intampinam o problema tehnica la procesarea cazului dvs. Va rugam confirmati daca doriti sa continuam."
                        .into(),
                ),
            };
        }

        let params = json!({
            "case_id": nc.case_id,
            "description": format!("Caz blocat la nodul '{failing_node}': {error_message}"),
            "state_snapshot": {"failing_node": failing_node, "error_kind": error_kind},
        });
        match nc.tools.dispatch("open_support_ticket", params, nc.tool_ctx).await {
            ToolOutcome::Ok { value } => {
                let ticket_id = value.get("ticket_id").and_then(|v| v.as_str()).unwrap_or("").to_string();
                NodeResult::Reply {
                    text: format!(
                        "Am deschis tichetul de suport {ticket_id} pentru acest caz; un coleg uman va va contacta in curand."
                    ),
                    metadata: ReplyMetadata { ticket_id: Some(ticket_id), ..ReplyMetadata::default() },
                }
            }
            ToolOutcome::Err { message, .. } => NodeResult::Error(crate::error::Error::permanent_backend("ticketing", message)),
        }
    }
}

fn sanitized_reply(error_kind: &str) -> String {
    match error_kind {
        "pii_violation" => {
            "Nu am putut genera acest document deoarece ar fi continut date personale neprotejate. Am oprit operatiunea.".into()
        }
        "validation" => "Cererea nu a putut fi procesata din cauza unor date invalide sau incomplete.".into(),
        "authorization" => "Nu aveti drepturile necesare pentru aceasta operatiune.".into(),
        "not_found" => "Elementul cerut nu a fost gasit pentru acest caz.".into(),
        _ => "Cererea nu a putut fi procesata.".into(),
    }
}
