//! `case_processing_state`: checkpoint of in-flight orchestration (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    pub node: String,
    pub inputs: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingState {
    pub last_completed_node: String,
    pub pending_action: PendingAction,
    pub state_saved_at: DateTime<Utc>,
}

impl ProcessingState {
    pub fn new(last_completed_node: impl Into<String>, node: impl Into<String>, inputs: serde_json::Value) -> Self {
        Self {
            last_completed_node: last_completed_node.into(),
            pending_action: PendingAction { node: node.into(), inputs },
            state_saved_at: Utc::now(),
        }
    }
}
