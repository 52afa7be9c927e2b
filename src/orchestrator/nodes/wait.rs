//! wait (spec §4.4): an idle terminal node for cases with nothing left to
//! do until an external event (a webhook, a scheduled nudge) wakes them.

use super::{Node, NodeContext};
use crate::orchestrator::NodeResult;
use async_trait::async_trait;
use serde_json::json;

pub struct WaitNode;

#[async_trait]
impl Node for WaitNode {
    fn name(&self) -> &'static str {
        "wait"
    }

    async fn run(&self, _nc: &mut NodeContext<'_>) -> NodeResult {
        NodeResult::Suspend {
            reason: "idle".into(),
            resume_node: "wait".into(),
            resume_inputs: json!({}),
            message: None,
        }
    }
}
