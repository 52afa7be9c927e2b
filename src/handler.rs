//! Request Handler (spec §4.6): the single entry point for one end-user
//! message or resume event. Ties authorization, the per-case lock, the
//! orchestrator, and response shaping together, following the teacher's
//! `Orchestrator::run` contract (load, drive, terminal result) restated
//! as a free function over these collaborators.

use crate::case::Owner;
use crate::config::OrchestratorConfig;
use crate::error::{Error, Result};
use crate::lock::CaseLock;
use crate::llm::LlmClient;
use crate::orchestrator::{Orchestrator, Outcome, ReplyMetadata, RequestEvent};
use crate::store::CaseStore;
use crate::tools::{ToolContext, ToolRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Read-access check for a case (spec §4.6 step 1). Delegated to an
/// external auth collaborator in a full deployment; `AllowAllAuthorizer`
/// is the stand-in used by tests and single-tenant deployments.
#[async_trait::async_trait]
pub trait Authorizer: Send + Sync {
    async fn can_access(&self, end_user_id: &str, owner: &Owner) -> Result<bool>;
}

pub struct AllowAllAuthorizer;

#[async_trait::async_trait]
impl Authorizer for AllowAllAuthorizer {
    async fn can_access(&self, _end_user_id: &str, _owner: &Owner) -> Result<bool> {
        Ok(true)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub confidence: Option<f32>,
    pub execution_time_s: Option<f64>,
    pub risks: Vec<String>,
    pub draft_object_path: Option<String>,
    pub ticket_id: Option<String>,
}

impl From<ReplyMetadata> for ResponseMetadata {
    fn from(m: ReplyMetadata) -> Self {
        Self {
            confidence: m.confidence,
            execution_time_s: None,
            risks: m.risks,
            draft_object_path: m.draft_object_path,
            ticket_id: m.ticket_id,
        }
    }
}

/// `{status, message, timestamp, metadata?}` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HandlerResponse {
    Success { message: String, timestamp: chrono::DateTime<chrono::Utc>, metadata: ResponseMetadata },
    Suspended { message: String, timestamp: chrono::DateTime<chrono::Utc>, reason: String },
    Busy { timestamp: chrono::DateTime<chrono::Utc> },
    Error { message: String, timestamp: chrono::DateTime<chrono::Utc> },
}

impl HandlerResponse {
    /// HTTP-equivalent status code the outer gateway maps this to (spec §6).
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Success { .. } | Self::Suspended { .. } | Self::Busy { .. } => 200,
            Self::Error { .. } => 500,
        }
    }
}

/// Bundles every collaborator one case invocation needs.
pub struct RequestHandler {
    pub case_store: Arc<dyn CaseStore>,
    pub party_store: Arc<dyn crate::party::PartyStore>,
    pub kb: Arc<dyn crate::kb::KnowledgeBase>,
    pub billing: Arc<dyn crate::billing::Billing>,
    pub ticketing: Arc<dyn crate::ticketing::Ticketing>,
    pub objectstore: Arc<dyn crate::objectstore::ObjectStore>,
    pub reasoner: Arc<dyn LlmClient>,
    pub assistant: Arc<dyn LlmClient>,
    pub authorizer: Arc<dyn Authorizer>,
    pub lock: CaseLock,
    pub tools: ToolRegistry,
    pub orchestrator: Orchestrator,
    pub config: Arc<OrchestratorConfig>,
}

impl RequestHandler {
    pub async fn handle_message(&self, case_id: &str, end_user_id: &str, text: String) -> HandlerResponse {
        self.handle(case_id, end_user_id, RequestEvent::UserMessage { text }).await
    }

    /// Inbound payment webhook (spec §6): idempotent on `event_id`.
    pub async fn handle_payment_webhook(&self, case_id: &str, event_id: &str, payload: Value) -> HandlerResponse {
        match self.case_store.mark_webhook_event(case_id, event_id) {
            Ok(true) => {}
            Ok(false) => {
                return HandlerResponse::Success {
                    message: "eveniment deja procesat".into(),
                    timestamp: chrono::Utc::now(),
                    metadata: ResponseMetadata::default(),
                }
            }
            Err(e) => return self.error_response(&e),
        }
        self.handle(case_id, "system:billing_webhook", RequestEvent::Resume { reason: "payment_completed".into(), payload })
            .await
    }

    async fn handle(&self, case_id: &str, end_user_id: &str, event: RequestEvent) -> HandlerResponse {
        let start = Instant::now();

        let snapshot = match self.case_store.load(case_id) {
            Ok(s) => s,
            Err(e) => return self.error_response(&e),
        };

        match self.authorizer.can_access(end_user_id, &snapshot.case.owner).await {
            Ok(true) => {}
            Ok(false) => return self.error_response(&Error::authorization(format!("{end_user_id} lacks access to {case_id}"))),
            Err(e) => return self.error_response(&e),
        }

        let lease = self.config.lease_duration();
        let Some(_guard) = self.lock.try_acquire(case_id, end_user_id, lease) else {
            return HandlerResponse::Busy { timestamp: chrono::Utc::now() };
        };

        let tool_ctx = ToolContext {
            case_id: case_id.to_string(),
            case_store: self.case_store.clone(),
            party_store: self.party_store.clone(),
            kb: self.kb.clone(),
            billing: self.billing.clone(),
            ticketing: self.ticketing.clone(),
            objectstore: self.objectstore.clone(),
            reasoner: self.reasoner.clone(),
            config: self.config.clone(),
        };

        let deadline = Instant::now() + Duration::from_secs(self.config.max_invocation_seconds.max(1));
        let result = self.orchestrator.run(event, &tool_ctx, &self.tools, self.assistant.as_ref(), deadline).await;

        match result {
            Ok(Outcome::Reply { text, metadata }) => {
                let mut response_metadata: ResponseMetadata = metadata.into();
                response_metadata.execution_time_s = Some(start.elapsed().as_secs_f64());
                HandlerResponse::Success { message: text, timestamp: chrono::Utc::now(), metadata: response_metadata }
            }
            Ok(Outcome::Suspended { reason, message }) => HandlerResponse::Suspended {
                message: message.unwrap_or_else(|| "Cererea dvs. a fost inregistrata si va fi procesata.".into()),
                timestamp: chrono::Utc::now(),
                reason,
            },
            Err(err) => {
                tracing::warn!(case_id, error = %err, "orchestrator failed unhandled, escalating to support");
                let params = serde_json::json!({
                    "case_id": case_id,
                    "description": format!("Caz escaladat dupa o eroare neasteptata: {err}"),
                    "state_snapshot": {},
                });
                let _ = self.tools.dispatch("open_support_ticket", params, &tool_ctx).await;
                self.error_response(&err)
            }
        }
    }

    fn error_response(&self, err: &Error) -> HandlerResponse {
        tracing::warn!(error = %err, "request handler returning a sanitized error response");
        HandlerResponse::Error {
            message: "Ne pare rau, a aparut o eroare neasteptata la procesarea cererii dvs.".into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::FakeBilling;
    use crate::case::{Case, CaseStatus, Owner};
    use crate::kb::FakeKnowledgeBase;
    use crate::llm::{ClientConfig, ReasonerClient, ScriptedLlmClient};
    use crate::objectstore::FakeObjectStore;
    use crate::party::SqlitePartyStore;
    use crate::store::SqliteCaseStore;
    use crate::ticketing::FakeTicketing;

    fn handler(assistant: ScriptedLlmClient) -> (Arc<SqliteCaseStore>, RequestHandler) {
        let case_store = Arc::new(SqliteCaseStore::in_memory().unwrap());
        let handler = RequestHandler {
            case_store: case_store.clone(),
            party_store: Arc::new(SqlitePartyStore::in_memory().unwrap()),
            kb: Arc::new(FakeKnowledgeBase { records: vec![] }),
            billing: Arc::new(FakeBilling::new()),
            ticketing: Arc::new(FakeTicketing::new()),
            objectstore: Arc::new(FakeObjectStore::new()),
            reasoner: Arc::new(ReasonerClient::new(ClientConfig::new("k", "m")).unwrap()),
            assistant: Arc::new(assistant),
            authorizer: Arc::new(AllowAllAuthorizer),
            lock: CaseLock::new(),
            tools: ToolRegistry::default_with_builtins(),
            orchestrator: Orchestrator::new(),
            config: Arc::new(OrchestratorConfig { max_invocation_seconds: 30, ..OrchestratorConfig::default() }),
        };
        (case_store, handler)
    }

    #[tokio::test]
    async fn unknown_case_reports_an_error_response_not_a_panic() {
        let (_store, handler) = handler(ScriptedLlmClient::text("assistant", true, vec![]));
        let response = handler.handle_message("missing", "u1", "salut".into()).await;
        assert!(matches!(response, HandlerResponse::Error { .. }));
    }

    #[tokio::test]
    async fn a_held_lock_reports_busy_instead_of_blocking() {
        let (case_store, handler) = handler(ScriptedLlmClient::text("assistant", true, vec![]));
        case_store.create_case(&Case::new("c1", Owner::Individual { user_id: "u1".into() })).unwrap();
        let _guard = handler.lock.try_acquire("c1", "other-invocation", Duration::from_secs(60)).unwrap();
        let response = handler.handle_message("c1", "u1", "salut".into()).await;
        assert!(matches!(response, HandlerResponse::Busy { .. }));
    }

    #[tokio::test]
    async fn duplicate_webhook_event_is_a_no_op() {
        let (case_store, handler) = handler(ScriptedLlmClient::text("assistant", true, vec![]));
        case_store.create_case(&Case::new("c2", Owner::Individual { user_id: "u2".into() })).unwrap();
        case_store.set_tier("c2", 1).unwrap();
        case_store.set_status("c2", CaseStatus::PaymentPending).unwrap();

        let r1 = handler.handle_payment_webhook("c2", "evt-1", serde_json::json!({"tier": 1})).await;
        assert!(matches!(r1, HandlerResponse::Success { .. }) || matches!(r1, HandlerResponse::Suspended { .. }));
        let r2 = handler.handle_payment_webhook("c2", "evt-1", serde_json::json!({"tier": 1})).await;
        match r2 {
            HandlerResponse::Success { message, .. } => assert_eq!(message, "eveniment deja procesat"),
            other => panic!("expected the idempotent no-op reply, got {other:?}"),
        }
    }
}
