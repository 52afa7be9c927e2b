//! quota-check (spec §4.4): gates on billing, flips the case Active or
//! parks it PaymentPending.

use super::{Node, NodeContext};
use crate::case::CaseStatus;
use crate::error::Error;
use crate::orchestrator::NodeResult;
use crate::tools::ToolOutcome;
use async_trait::async_trait;
use serde_json::json;

pub struct QuotaCheckNode;

#[async_trait]
impl Node for QuotaCheckNode {
    fn name(&self) -> &'static str {
        "quota_check"
    }

    async fn run(&self, nc: &mut NodeContext<'_>) -> NodeResult {
        let tier = nc
            .inputs
            .get("tier")
            .and_then(|v| v.as_u64())
            .or(nc.case.tier.map(|t| t as u64))
            .unwrap_or(1) as u8;

        let outcome = nc.tools.dispatch("check_quota", json!({"case_id": nc.case_id, "tier": tier}), nc.tool_ctx).await;
        let has_quota = match outcome {
            ToolOutcome::Ok { value } => value.get("has_quota").and_then(|v| v.as_bool()).unwrap_or(false),
            ToolOutcome::Err { message, retriable, .. } => {
                return NodeResult::Error(if retriable {
                    Error::transient_backend("billing", message)
                } else {
                    Error::permanent_backend("billing", message)
                });
            }
        };

        if has_quota {
            if let Err(e) = nc.tool_ctx.case_store.set_status(nc.case_id, CaseStatus::Active) {
                return NodeResult::Error(e);
            }
            NodeResult::Continue { next_node: "plan".into(), inputs: json!({}) }
        } else {
            if let Err(e) = nc.tool_ctx.case_store.set_status(nc.case_id, CaseStatus::PaymentPending) {
                return NodeResult::Error(e);
            }
            NodeResult::Suspend {
                reason: "awaiting_payment".into(),
                resume_node: "payment_wait".into(),
                resume_inputs: json!({"tier": tier}),
                message: Some(format!(
                    "Pentru a continua cu acest caz (tier {tier}) este necesara finalizarea platii."
                )),
            }
        }
    }
}
