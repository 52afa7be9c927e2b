//! Case metadata: the record CRUD collaborators create and only the
//! orchestrator transitions (spec §3).

pub mod context;
pub mod processing_state;

pub use context::{
    AgentInteractions, CaseContext, Draft, DraftStatus, DocumentAnalysis, Fact, LegalResearch,
    LogEntry, Objective, ObjectiveStatus, PartyInvolved, ResearchRecord, ResearchStatus, Summary,
    TimelineEvent,
};
pub use processing_state::{PendingAction, ProcessingState};

use serde::{Deserialize, Serialize};

/// The owner of a case: either an individual end user or an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Owner {
    Individual { user_id: String },
    Organization { org_id: String },
}

/// Case lifecycle status. Transitions are owned exclusively by the
/// orchestrator (spec §3); deletion is soft (status flip to `Deleted`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    TierPending,
    PaymentPending,
    Active,
    PausedSupport,
    Archived,
    Deleted,
}

impl CaseStatus {
    /// Whether `to` is a legal successor of `self` under the macro FSM
    /// (spec §8: `tier_pending -> {payment_pending, active}`,
    /// `payment_pending -> active`, `active -> {paused_support, archived,
    /// deleted}`, no reverse edges).
    pub fn can_transition_to(self, to: CaseStatus) -> bool {
        use CaseStatus::*;
        matches!(
            (self, to),
            (TierPending, PaymentPending)
                | (TierPending, Active)
                | (PaymentPending, Active)
                | (Active, PausedSupport)
                | (Active, Archived)
                | (Active, Deleted)
                | (PausedSupport, Archived)
                | (PausedSupport, Deleted)
        )
    }
}

/// A party attached to a case with its role (spec §3). Never carries PII;
/// only `party_id` is a lookup key into the party store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedParty {
    pub party_id: String,
    pub role: String,
}

/// Core case record (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub case_id: String,
    pub owner: Owner,
    pub status: CaseStatus,
    pub tier: Option<u8>,
    pub attached_parties: Vec<AttachedParty>,
    pub attached_documents: Vec<String>,
    pub assistant_session_id: Option<String>,
    pub reasoner_session_id: Option<String>,
}

impl Case {
    pub fn new(case_id: impl Into<String>, owner: Owner) -> Self {
        Self {
            case_id: case_id.into(),
            owner,
            status: CaseStatus::TierPending,
            tier: None,
            attached_parties: Vec::new(),
            attached_documents: Vec::new(),
            assistant_session_id: None,
            reasoner_session_id: None,
        }
    }

    /// Invariant: `tier != unset` implies `status` is not `tier_pending`.
    pub fn tier_invariant_holds(&self) -> bool {
        self.tier.is_none() || self.status != CaseStatus::TierPending
    }

    pub fn has_party(&self, party_id: &str) -> bool {
        self.attached_parties.iter().any(|p| p.party_id == party_id)
    }
}
