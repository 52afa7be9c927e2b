//! `case_details`: the mutable tree that is the agent's memory (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    pub current: String,
    pub history: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub fact: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveStatus {
    Pending,
    Achieved,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    pub objective: String,
    pub status: ObjectiveStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyInvolved {
    pub party_id: String,
    pub role_in_case: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub summary: String,
    pub key_points: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStatus {
    Considered,
    Applied,
    Irrelevant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRecord {
    pub doc_id: String,
    pub title: String,
    pub summary: String,
    pub full_text: Option<String>,
    pub relevance: f32,
    pub status: ResearchStatus,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegalResearch {
    pub legislation: Vec<ResearchRecord>,
    pub jurisprudence: Vec<ResearchRecord>,
}

impl LegalResearch {
    pub fn considered_legislation_count(&self) -> usize {
        self.legislation
            .iter()
            .filter(|r| r.status == ResearchStatus::Considered)
            .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub detail: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentInteractions {
    pub log: Vec<LogEntry>,
    pub active_info_request_to_user: Option<String>,
}

impl AgentInteractions {
    /// Append-only: no caller of this type may remove or mutate an existing
    /// entry. Used by every node that writes through `apply_updates`.
    pub fn push_log(&mut self, kind: impl Into<String>, detail: serde_json::Value) {
        self.log.push(LogEntry {
            timestamp: Utc::now(),
            kind: kind.into(),
            detail,
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Generated,
    Superseded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub draft_id: String,
    pub name: String,
    pub revision: u32,
    pub object_store_path: String,
    pub generated_at: DateTime<Utc>,
    pub status: DraftStatus,
    pub feedback: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub event: String,
}

/// `case_details`: required sub-structures from spec §3.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseContext {
    pub summary: Summary,
    pub facts: Vec<Fact>,
    pub objectives: Vec<Objective>,
    pub parties_involved: Vec<PartyInvolved>,
    pub documents_analysis: std::collections::HashMap<String, DocumentAnalysis>,
    pub legal_research: LegalResearch,
    pub agent_interactions: AgentInteractions,
    pub drafts: Vec<Draft>,
    pub timeline: Vec<TimelineEvent>,
    pub internal_notes: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl CaseContext {
    /// All objectives are non-pending: the `done` plan action's precondition.
    pub fn all_objectives_resolved(&self) -> bool {
        self.objectives
            .iter()
            .all(|o| o.status != ObjectiveStatus::Pending)
    }

    /// Next monotonic revision number for a draft name (spec §4.4).
    pub fn next_draft_revision(&self, name: &str) -> u32 {
        self.drafts
            .iter()
            .filter(|d| d.name == name)
            .map(|d| d.revision)
            .max()
            .unwrap_or(0)
            + 1
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}
