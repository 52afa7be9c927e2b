//! Node Library (spec §4.4): the eleven nodes the plan/act loop dispatches
//! between.

mod ask_user;
mod consult_reasoner;
mod draft;
mod handle_error;
mod payment_wait;
mod plan;
mod quota_check;
mod research;
mod tier_decide;
mod update_context;
mod wait;

pub use ask_user::AskUserNode;
pub use consult_reasoner::ConsultReasonerNode;
pub use draft::DraftNode;
pub use handle_error::HandleErrorNode;
pub use payment_wait::PaymentWaitNode;
pub use plan::PlanNode;
pub use quota_check::QuotaCheckNode;
pub use research::ResearchNode;
pub use tier_decide::TierDecideNode;
pub use update_context::UpdateContextNode;
pub use wait::WaitNode;

use super::{Node, NodeContext};
use crate::error::{Error, Result};
use crate::llm::{CompletionOutput, CompletionRequest, LlmClient};
use std::sync::Arc;

pub(crate) async fn attached_party_values(nc: &NodeContext<'_>) -> Vec<String> {
    crate::tools::builtin::attached_party_field_values(nc.tool_ctx).await.unwrap_or_default()
}

/// Run `client.generate()` through the shared redaction gate and unwrap a
/// text response; used by every node that calls the Assistant or Reasoner
/// directly rather than through a tool.
pub(crate) async fn generate_text(nc: &NodeContext<'_>, client: &dyn LlmClient, request: CompletionRequest) -> Result<String> {
    let values = attached_party_values(nc).await;
    let refs: Vec<&str> = values.iter().map(String::as_str).collect();
    let response = client.generate(request, &refs, nc.config).await?;
    match response.output {
        CompletionOutput::Text { text } => Ok(text),
        CompletionOutput::ToolCalls { .. } => Err(Error::permanent_backend("llm", "expected a text response, got tool calls")),
    }
}

pub(crate) fn truncate_to_budget(s: String, budget: usize) -> String {
    if s.len() <= budget {
        s
    } else {
        s.chars().take(budget).collect()
    }
}

fn raw_context_digest(nc: &NodeContext<'_>) -> String {
    format!(
        "Rezumat: {}\nObiective: {}\nUltima nota interna: {}",
        nc.context.summary.current,
        nc.context
            .objectives
            .iter()
            .map(|o| format!("{} [{:?}]", o.objective, o.status))
            .collect::<Vec<_>>()
            .join("; "),
        nc.context.internal_notes.last().cloned().unwrap_or_default(),
    )
}

/// A compact digest of the mutable case memory, bounded by
/// `assistant_context_budget_bytes` (spec §6), fed to every node that
/// prompts an LLM about the case as a whole.
pub(crate) fn context_digest(nc: &NodeContext<'_>) -> String {
    truncate_to_budget(raw_context_digest(nc), nc.config.assistant_context_budget_bytes)
}

/// Same digest, but refuses to silently truncate: `plan` (spec §8 boundary
/// behavior) must fail loudly rather than drop facts from an
/// under-provisioned budget.
pub(crate) fn context_digest_checked(nc: &NodeContext<'_>) -> Result<String> {
    let raw = raw_context_digest(nc);
    if raw.len() > nc.config.assistant_context_budget_bytes {
        return Err(Error::validation(format!(
            "assistant_context_budget_bytes ({}) is too small for this case's context digest ({} bytes)",
            nc.config.assistant_context_budget_bytes,
            raw.len()
        )));
    }
    Ok(raw)
}

pub fn all() -> Vec<Arc<dyn Node>> {
    vec![
        Arc::new(TierDecideNode),
        Arc::new(QuotaCheckNode),
        Arc::new(PaymentWaitNode),
        Arc::new(PlanNode),
        Arc::new(AskUserNode),
        Arc::new(ResearchNode),
        Arc::new(ConsultReasonerNode),
        Arc::new(DraftNode),
        Arc::new(UpdateContextNode),
        Arc::new(HandleErrorNode),
        Arc::new(WaitNode),
    ]
}
