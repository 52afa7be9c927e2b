//! research (spec §4.4): issues one structured research query and folds
//! the results into `legal_research` as `considered`, then always routes
//! through consult-reasoner for a review before planning continues.

use super::{context_digest, generate_text, Node, NodeContext};
use crate::error::Error;
use crate::orchestrator::NodeResult;
use crate::store::Update;
use crate::tools::ToolOutcome;
use async_trait::async_trait;
use serde_json::json;

pub struct ResearchNode;

#[async_trait]
impl Node for ResearchNode {
    fn name(&self) -> &'static str {
        "research"
    }

    async fn run(&self, nc: &mut NodeContext<'_>) -> NodeResult {
        let request = crate::llm::CompletionRequest::new(
            "Esti coordonatorul unui dosar juridic. Formuleaza o interogare de cercetare juridica structurata. \
             Raspunde STRICT cu JSON de forma {\"source\": \"legislation\"|\"jurisprudence\", \
             \"keywords\": [...], \"mode\": \"summaries\"|\"full_text\"}.",
            vec![crate::llm::ChatMessage::user(context_digest(nc))],
        );

        let text = match generate_text(nc, nc.assistant, request).await {
            Ok(t) => t,
            Err(e) => return NodeResult::Error(e),
        };

        let Some(query) = parse_query(&text) else {
            return NodeResult::Error(Error::validation("assistant did not return a usable research query"));
        };

        let outcome = nc.tools.dispatch("research_query", query.clone(), nc.tool_ctx).await;
        let records = match outcome {
            ToolOutcome::Ok { value } => value,
            ToolOutcome::Err { kind, message, retriable } => {
                return NodeResult::Error(match kind {
                    crate::tools::ToolErrorKind::InvalidInput => Error::validation(message),
                    _ if retriable => Error::transient_backend("knowledge_base", message),
                    _ => Error::permanent_backend("knowledge_base", message),
                });
            }
        };

        let path = match query["source"].as_str() {
            Some("jurisprudence") => "legal_research.jurisprudence",
            _ => "legal_research.legislation",
        };

        let entries = records
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|mut r| {
                if let Some(obj) = r.as_object_mut() {
                    obj.insert("status".into(), json!("considered"));
                    obj.insert("fetched_at".into(), json!(chrono::Utc::now()));
                }
                r
            })
            .collect::<Vec<_>>();

        if !entries.is_empty() {
            let updates = vec![Update::append(path, json!(entries))];
            if let Err(e) = nc.tool_ctx.case_store.apply_updates(nc.case_id, &updates) {
                return NodeResult::Error(e);
            }
        }

        NodeResult::Continue { next_node: "consult_reasoner".into(), inputs: json!({"purpose": "review_research"}) }
    }
}

fn parse_query(text: &str) -> Option<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(text.trim()).ok()?;
    let source = value.get("source")?.as_str()?;
    if !matches!(source, "legislation" | "jurisprudence") {
        return None;
    }
    let mode = value.get("mode").and_then(|v| v.as_str()).unwrap_or("summaries");
    Some(json!({
        "source": source,
        "keywords": value.get("keywords").cloned().unwrap_or_else(|| json!([])),
        "mode": if mode == "full_text" { "full_text" } else { "summaries" },
    }))
}
