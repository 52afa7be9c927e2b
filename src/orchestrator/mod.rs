//! Orchestrator core (spec §4.4, §4.5): the macro/micro state machine that
//! drives the plan/act loop over the Node Library. Grounded on the
//! teacher's `Orchestrator` trait and `FallbackLoop` iterative retry
//! structure (`orchestrator.rs`): a node dispatch table plus a driving
//! loop that reacts to each step's outcome instead of a single linear
//! pipeline.

pub mod nodes;

use crate::case::{CaseStatus, ProcessingState};
use crate::error::{Error, Result};
use crate::llm::LlmClient;
use crate::tools::{ToolContext, ToolRegistry};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a node produced for this step (spec §4.4).
pub enum NodeResult {
    Continue { next_node: String, inputs: Value },
    Reply { text: String, metadata: ReplyMetadata },
    Suspend { reason: String, resume_node: String, resume_inputs: Value, message: Option<String> },
    Error(Error),
}

#[derive(Debug, Clone, Default)]
pub struct ReplyMetadata {
    pub confidence: Option<f32>,
    pub risks: Vec<String>,
    pub draft_object_path: Option<String>,
    pub ticket_id: Option<String>,
}

/// What triggers one orchestrator invocation (spec §4.6).
#[derive(Debug, Clone)]
pub enum RequestEvent {
    UserMessage { text: String },
    Resume { reason: String, payload: Value },
}

/// Outcome of a full request (spec §4.6).
pub enum Outcome {
    Reply { text: String, metadata: ReplyMetadata },
    Suspended { reason: String, message: Option<String> },
}

/// Borrowed view a node needs for one invocation. Nodes read `case`/
/// `context`; all writes go through `tool_ctx.case_store`, never by
/// mutating the borrowed snapshot in place.
pub struct NodeContext<'a> {
    pub case_id: &'a str,
    pub case: &'a crate::case::Case,
    pub context: &'a crate::case::CaseContext,
    pub inputs: Value,
    pub scratchpad: &'a mut Value,
    pub tools: &'a ToolRegistry,
    pub tool_ctx: &'a ToolContext,
    pub assistant: &'a dyn LlmClient,
    pub config: &'a crate::config::OrchestratorConfig,
}

#[async_trait]
pub trait Node: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, nc: &mut NodeContext<'_>) -> NodeResult;
}

enum EntryDecision {
    Resume(String, Value),
    ImmediateReply(String),
}

fn inject_event(mut inputs: Value, event: &RequestEvent) -> Value {
    if !inputs.is_object() {
        inputs = json!({});
    }
    let map = inputs.as_object_mut().expect("just coerced to object");
    match event {
        RequestEvent::UserMessage { text } => {
            map.insert("user_message".into(), json!(text));
        }
        RequestEvent::Resume { reason, payload } => {
            map.insert("resume_reason".into(), json!(reason));
            map.insert("resume_payload".into(), payload.clone());
        }
    }
    inputs
}

/// Entry/resume routing (spec §4.5): a saved `processing_state` always
/// takes precedence, except a pending `payment_wait` resumption that
/// isn't actually the payment-completed event must not silently flip the
/// case to Active.
fn route_entry(snapshot: &crate::store::CaseSnapshot, event: &RequestEvent) -> EntryDecision {
    let is_payment_resume = matches!(event, RequestEvent::Resume { reason, .. } if reason == "payment_completed");

    if let Some(ps) = &snapshot.processing_state {
        if ps.pending_action.node == "payment_wait" && !is_payment_resume {
            return EntryDecision::ImmediateReply(
                "Cazul dvs. asteapta finalizarea platii pentru a putea continua.".into(),
            );
        }
        return EntryDecision::Resume(ps.pending_action.node.clone(), inject_event(ps.pending_action.inputs.clone(), event));
    }

    match snapshot.case.status {
        CaseStatus::TierPending => EntryDecision::Resume("tier_decide".into(), inject_event(json!({}), event)),
        CaseStatus::PaymentPending => {
            EntryDecision::ImmediateReply("Cazul dvs. asteapta finalizarea platii pentru a putea continua.".into())
        }
        CaseStatus::Active => EntryDecision::Resume("plan".into(), inject_event(json!({}), event)),
        CaseStatus::PausedSupport => {
            EntryDecision::ImmediateReply("Acest caz este in asteptarea unui agent de suport uman.".into())
        }
        CaseStatus::Archived | CaseStatus::Deleted => EntryDecision::ImmediateReply("Acest caz nu mai este activ.".into()),
    }
}

fn error_kind_str(err: &Error) -> &'static str {
    match err {
        Error::Validation { .. } => "validation",
        Error::Authorization { .. } => "authorization",
        Error::NotFound { .. } => "not_found",
        Error::TransientBackend { .. } => "transient_backend",
        Error::PermanentBackend { .. } => "permanent_backend",
        Error::PiiViolation { .. } => "pii_violation",
        Error::LoopBudgetExhausted { .. } => "loop_budget_exhausted",
        Error::DeadlineExceededMidTool { .. } => "deadline_exceeded_mid_tool",
        Error::Serialization(_) | Error::Storage(_) | Error::Internal(_) => "internal",
    }
}

/// Dispatch table over the Node Library plus the driving plan/act loop.
pub struct Orchestrator {
    nodes: HashMap<&'static str, Arc<dyn Node>>,
}

impl Orchestrator {
    pub fn new() -> Self {
        let mut nodes: HashMap<&'static str, Arc<dyn Node>> = HashMap::new();
        for node in nodes::all() {
            nodes.insert(node.name(), node);
        }
        Self { nodes }
    }

    pub async fn run(
        &self,
        event: RequestEvent,
        tool_ctx: &ToolContext,
        tools: &ToolRegistry,
        assistant: &dyn LlmClient,
        deadline: Instant,
    ) -> Result<Outcome> {
        let case_id = tool_ctx.case_id.clone();
        let config = tool_ctx.config.clone();
        let snapshot = tool_ctx.case_store.load(&case_id)?;

        let (mut current_node, mut current_inputs) = match route_entry(&snapshot, &event) {
            EntryDecision::ImmediateReply(text) => return Ok(Outcome::Reply { text, metadata: ReplyMetadata::default() }),
            EntryDecision::Resume(node, inputs) => (node, inputs),
        };

        let mut scratchpad = json!({});
        let mut nodes_executed: u32 = 0;
        let slack = Duration::from_secs(config.deadline_slack_seconds);

        loop {
            if Instant::now() + slack >= deadline {
                let state = ProcessingState::new("deadline", current_node.clone(), current_inputs.clone());
                tool_ctx.case_store.save_processing_state(&case_id, &state)?;
                return Ok(Outcome::Suspended { reason: "deadline".into(), message: None });
            }

            if nodes_executed >= config.max_nodes_per_request && current_node != "handle_error" {
                let failing_node = current_node.clone();
                let failing_inputs = current_inputs.clone();
                current_node = "handle_error".into();
                current_inputs = json!({
                    "failing_node": failing_node,
                    "failing_inputs": failing_inputs,
                    "error_kind": "loop_budget_exhausted",
                    "error_message": format!("exceeded {} nodes per request", config.max_nodes_per_request),
                    "retriable": false,
                });
            }

            let snapshot = tool_ctx.case_store.load(&case_id)?;
            let Some(node) = self.nodes.get(current_node.as_str()).cloned() else {
                return Err(Error::internal(format!("unknown orchestrator node {current_node}")));
            };

            let mut nc = NodeContext {
                case_id: &case_id,
                case: &snapshot.case,
                context: &snapshot.context,
                inputs: current_inputs.clone(),
                scratchpad: &mut scratchpad,
                tools,
                tool_ctx,
                assistant,
                config: &config,
            };

            tracing::debug!(case_id = %case_id, node = current_node, nodes_executed, "dispatching orchestrator node");
            let result = node.run(&mut nc).await;
            nodes_executed += 1;

            match result {
                NodeResult::Continue { next_node, inputs } => {
                    current_node = next_node;
                    current_inputs = inputs;
                }
                NodeResult::Reply { text, metadata } => {
                    tool_ctx.case_store.clear_processing_state(&case_id)?;
                    return Ok(Outcome::Reply { text, metadata });
                }
                NodeResult::Suspend { reason, resume_node, resume_inputs, message } => {
                    let state = ProcessingState::new(current_node.clone(), resume_node, resume_inputs);
                    tool_ctx.case_store.save_processing_state(&case_id, &state)?;
                    return Ok(Outcome::Suspended { reason, message });
                }
                NodeResult::Error(err) => {
                    tracing::warn!(case_id = %case_id, node = current_node, error = %err, "node returned an error");
                    if current_node == "handle_error" {
                        return Err(err);
                    }
                    let failing_node = current_node.clone();
                    let failing_inputs = current_inputs.clone();
                    current_node = "handle_error".into();
                    current_inputs = json!({
                        "failing_node": failing_node,
                        "failing_inputs": failing_inputs,
                        "error_kind": error_kind_str(&err),
                        "error_message": err.to_string(),
                        "retriable": err.is_retriable(),
                    });
                }
            }
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::FakeBilling;
    use crate::case::{Case, Owner};
    use crate::config::OrchestratorConfig;
    use crate::kb::FakeKnowledgeBase;
    use crate::llm::{ClientConfig, ReasonerClient, ScriptedLlmClient};
    use crate::objectstore::FakeObjectStore;
    use crate::party::SqlitePartyStore;
    use crate::store::SqliteCaseStore;
    use crate::ticketing::FakeTicketing;
    use std::sync::Arc;

    fn harness(case: Case) -> (Arc<SqliteCaseStore>, ToolContext) {
        let case_store = Arc::new(SqliteCaseStore::in_memory().unwrap());
        case_store.create_case(&case).unwrap();
        let party_store = Arc::new(SqlitePartyStore::in_memory().unwrap());
        let ctx = ToolContext {
            case_id: case.case_id.clone(),
            case_store: case_store.clone(),
            party_store,
            kb: Arc::new(FakeKnowledgeBase { records: vec![] }),
            billing: Arc::new(FakeBilling::new()),
            ticketing: Arc::new(FakeTicketing::new()),
            objectstore: Arc::new(FakeObjectStore::new()),
            reasoner: Arc::new(ReasonerClient::new(ClientConfig::new("k", "m")).unwrap()),
            config: Arc::new(OrchestratorConfig::default()),
        };
        (case_store, ctx)
    }

    #[tokio::test]
    async fn fresh_case_with_quota_reaches_active_and_plans() {
        let case = Case::new("c1", Owner::Individual { user_id: "u1".into() });
        let (case_store, mut ctx) = harness(case);
        let billing = FakeBilling::new();
        billing.grant("user:u1", 1);
        ctx.billing = Arc::new(billing);

        let tools = ToolRegistry::default_with_builtins();
        let orchestrator = Orchestrator::new();
        let assistant = ScriptedLlmClient::text(
            "assistant",
            true,
            vec![
                r#"{"tier": 1, "justification": "simplu"}"#,
                r#"{"candidate_actions": ["done"], "reason": "toate obiectivele rezolvate"}"#,
            ],
        );

        let deadline = Instant::now() + Duration::from_secs(30);
        let outcome = orchestrator
            .run(
                RequestEvent::UserMessage { text: "Am primit o amenda de circulatie.".into() },
                &ctx,
                &tools,
                &assistant,
                deadline,
            )
            .await
            .unwrap();

        match outcome {
            Outcome::Reply { .. } => {}
            Outcome::Suspended { .. } => panic!("expected a reply, case has no pending objectives"),
        }
        let snap = case_store.load("c1").unwrap();
        assert_eq!(snap.case.status, CaseStatus::Active);
        assert_eq!(snap.case.tier, Some(1));
    }

    #[tokio::test]
    async fn fresh_case_without_quota_suspends_awaiting_payment() {
        let case = Case::new("c2", Owner::Individual { user_id: "u2".into() });
        let (case_store, ctx) = harness(case);
        let tools = ToolRegistry::default_with_builtins();
        let orchestrator = Orchestrator::new();
        let assistant = ScriptedLlmClient::text("assistant", true, vec![r#"{"tier": 3, "justification": "complex"}"#]);

        let deadline = Instant::now() + Duration::from_secs(30);
        let outcome = orchestrator
            .run(
                RequestEvent::UserMessage { text: "Am un caz de insolventa complex cu mai multe firme.".into() },
                &ctx,
                &tools,
                &assistant,
                deadline,
            )
            .await
            .unwrap();

        match outcome {
            Outcome::Suspended { reason, message } => {
                assert_eq!(reason, "awaiting_payment");
                assert!(message.is_some());
            }
            Outcome::Reply { .. } => panic!("expected suspension pending payment"),
        }
        let snap = case_store.load("c2").unwrap();
        assert_eq!(snap.case.status, CaseStatus::PaymentPending);
        assert!(snap.processing_state.is_some());
    }

    #[tokio::test]
    async fn payment_webhook_resume_routes_to_payment_wait_and_not_a_stray_message() {
        let case = Case::new("c3", Owner::Individual { user_id: "u3".into() });
        let (case_store, ctx) = harness(case);
        case_store.set_tier("c3", 2).unwrap();
        case_store.set_status("c3", CaseStatus::PaymentPending).unwrap();
        case_store
            .save_processing_state(
                "c3",
                &ProcessingState::new("quota_check", "payment_wait", json!({"tier": 2})),
            )
            .unwrap();

        let tools = ToolRegistry::default_with_builtins();
        let orchestrator = Orchestrator::new();
        let assistant = ScriptedLlmClient::text("assistant", true, vec![]);

        // A stray user message does not prematurely resume payment_wait.
        let deadline = Instant::now() + Duration::from_secs(30);
        let outcome = orchestrator
            .run(RequestEvent::UserMessage { text: "salut".into() }, &ctx, &tools, &assistant, deadline)
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Reply { .. }));
        assert_eq!(case_store.load("c3").unwrap().case.status, CaseStatus::PaymentPending);

        // The actual payment-completed resume does.
        let assistant2 = ScriptedLlmClient::text(
            "assistant",
            true,
            vec![r#"{"candidate_actions": ["done"], "reason": "toate obiectivele rezolvate"}"#],
        );
        let outcome2 = orchestrator
            .run(
                RequestEvent::Resume { reason: "payment_completed".into(), payload: json!({"tier": 2}) },
                &ctx,
                &tools,
                &assistant2,
                deadline,
            )
            .await
            .unwrap();
        assert!(matches!(outcome2, Outcome::Reply { .. }));
        assert_eq!(case_store.load("c3").unwrap().case.status, CaseStatus::Active);
    }

    #[tokio::test]
    async fn max_nodes_per_request_one_yields_a_terminal_outcome_after_one_node() {
        let case = Case::new("c4", Owner::Individual { user_id: "u4".into() });
        let (case_store, mut ctx) = harness(case);
        let mut cfg = (*ctx.config).clone();
        cfg.max_nodes_per_request = 1;
        ctx.config = Arc::new(cfg);

        let tools = ToolRegistry::default_with_builtins();
        let orchestrator = Orchestrator::new();
        let assistant = ScriptedLlmClient::text("assistant", true, vec![r#"{"tier": 1, "justification": "simplu"}"#]);

        let deadline = Instant::now() + Duration::from_secs(30);
        // tier_decide succeeds (1 node); the next would-be node immediately
        // hits the budget and is escalated instead of silently continuing.
        let outcome = orchestrator
            .run(
                RequestEvent::UserMessage { text: "O problema simpla, rapid.".into() },
                &ctx,
                &tools,
                &assistant,
                deadline,
            )
            .await
            .unwrap();
        match outcome {
            Outcome::Reply { .. } | Outcome::Suspended { .. } => {}
        }
        let _ = case_store.load("c4").unwrap();
    }
}
