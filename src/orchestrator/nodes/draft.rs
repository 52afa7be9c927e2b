//! draft (spec §4.4, scenario 6): generates a Markdown document with
//! `{{partyN.field}}` placeholders instead of raw personal data. The PII
//! scan runs here, before any tool is dispatched, so a leak never reaches
//! `generate_draft` — that tool's own scan is a second, independent layer.

use super::{context_digest, generate_text, Node, NodeContext};
use crate::error::Error;
use crate::orchestrator::{NodeResult, ReplyMetadata};
use crate::tools::ToolOutcome;
use async_trait::async_trait;
use serde_json::json;

pub struct DraftNode;

#[async_trait]
impl Node for DraftNode {
    fn name(&self) -> &'static str {
        "draft"
    }

    async fn run(&self, nc: &mut NodeContext<'_>) -> NodeResult {
        let draft_name = nc.inputs.get("draft_name").and_then(|v| v.as_str()).unwrap_or("document").to_string();

        let request = crate::llm::CompletionRequest::new(
            "Esti coordonatorul unui dosar juridic. Redacteaza un document in format Markdown pentru acest caz. \
             Pentru orice date personale ale partilor foloseste EXCLUSIV substituenti de forma \
             {{partyN.camp}} (de exemplu {{party0.last_name}}) si niciodata valori reale.",
            vec![crate::llm::ChatMessage::user(context_digest(nc))],
        );

        let markdown = match generate_text(nc, nc.assistant, request).await {
            Ok(t) => t,
            Err(e) => return NodeResult::Error(e),
        };

        if let Some(kind) = crate::llm::redaction::scan_for_pii_formats(&markdown) {
            let _ = nc.tool_ctx.case_store.apply_updates(
                nc.case_id,
                &[crate::store::Update::append(
                    "agent_interactions.log",
                    json!({"kind": "pii_violation", "detail": {"node": "draft", "format": kind}, "timestamp": chrono::Utc::now()}),
                )],
            );
            return NodeResult::Error(Error::pii_violation(format!(
                "draft contained a raw {kind} value instead of a placeholder"
            )));
        }

        let params = json!({"case_id": nc.case_id, "markdown": markdown, "draft_name": draft_name});
        let outcome = nc.tools.dispatch("generate_draft", params, nc.tool_ctx).await;
        let object_path = match outcome {
            ToolOutcome::Ok { value } => value.get("object_path").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            ToolOutcome::Err { kind, message, retriable } => {
                return NodeResult::Error(match kind {
                    crate::tools::ToolErrorKind::Unauthorized => Error::authorization(message),
                    crate::tools::ToolErrorKind::InvalidInput => Error::validation(message),
                    _ if retriable => Error::transient_backend("objectstore", message),
                    _ => Error::permanent_backend("objectstore", message),
                });
            }
        };

        NodeResult::Reply {
            text: format!("Am generat documentul \"{draft_name}\". Il gasiti la {object_path}."),
            metadata: ReplyMetadata { draft_object_path: Some(object_path), ..ReplyMetadata::default() },
        }
    }
}
