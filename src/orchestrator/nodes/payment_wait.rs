//! payment-wait (spec §4.4): entered only via the payment-completed resume
//! path (routing is the orchestrator's job, not this node's); flips the
//! case Active and hands off to plan.

use super::{Node, NodeContext};
use crate::case::CaseStatus;
use crate::orchestrator::NodeResult;
use async_trait::async_trait;
use serde_json::json;

pub struct PaymentWaitNode;

#[async_trait]
impl Node for PaymentWaitNode {
    fn name(&self) -> &'static str {
        "payment_wait"
    }

    async fn run(&self, nc: &mut NodeContext<'_>) -> NodeResult {
        if let Err(e) = nc.tool_ctx.case_store.set_status(nc.case_id, CaseStatus::Active) {
            return NodeResult::Error(e);
        }
        NodeResult::Continue { next_node: "plan".into(), inputs: json!({}) }
    }
}
