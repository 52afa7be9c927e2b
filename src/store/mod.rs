//! Case Context Store Adapter (spec §4.2): read/modify interface over the
//! persisted `case_details` tree and `case_processing_state` snapshot.

pub mod dotpath;
pub mod schema;

pub use dotpath::Update;

use crate::case::{Case, CaseContext, CaseStatus, ProcessingState};
use crate::error::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Fixed-length idempotency key for a webhook event id, regardless of the
/// provider's own id format or length.
fn webhook_event_key(event_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Snapshot returned by `load`.
pub struct CaseSnapshot {
    pub case: Case,
    pub context: CaseContext,
    pub processing_state: Option<ProcessingState>,
}

/// Persistence surface consumed by the orchestrator and request handler.
/// All writes are transactional against a single case document; concurrent
/// writes to the same case are serialized by the caller's single-writer
/// lock (§5), not by this trait.
pub trait CaseStore: Send + Sync {
    fn create_case(&self, case: &Case) -> Result<()>;
    fn load(&self, case_id: &str) -> Result<CaseSnapshot>;
    fn apply_updates(&self, case_id: &str, updates: &[Update]) -> Result<()>;
    fn set_status(&self, case_id: &str, status: CaseStatus) -> Result<()>;
    fn set_tier(&self, case_id: &str, tier: u8) -> Result<()>;
    fn set_sessions(&self, case_id: &str, assistant_session_id: Option<String>, reasoner_session_id: Option<String>) -> Result<()>;
    fn save_processing_state(&self, case_id: &str, state: &ProcessingState) -> Result<()>;
    fn clear_processing_state(&self, case_id: &str) -> Result<()>;
    /// Idempotency: true if this is the first time `event_id` is seen for this case.
    fn mark_webhook_event(&self, case_id: &str, event_id: &str) -> Result<bool>;
}

/// SQLite-backed implementation, following the teacher's
/// `Arc<Mutex<Connection>>` + locked-closure idiom.
pub struct SqliteCaseStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCaseStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| Error::storage(e.to_string()))?;
        schema::initialize_schema(&conn).map_err(|e| Error::storage(e.to_string()))?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::storage(e.to_string()))?;
        schema::initialize_schema(&conn).map_err(|e| Error::storage(e.to_string()))?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::internal("case store mutex poisoned"))?;
        f(&conn)
    }

    fn load_row(conn: &Connection, case_id: &str) -> Result<(String, String, Option<String>)> {
        conn.query_row(
            "SELECT case_json, context_json, processing_state_json FROM cases WHERE case_id = ?1",
            params![case_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            },
        )
        .optional()
        .map_err(|e| Error::storage(e.to_string()))?
        .ok_or_else(|| Error::not_found("case", case_id))
    }
}

impl CaseStore for SqliteCaseStore {
    fn create_case(&self, case: &Case) -> Result<()> {
        let case_json = serde_json::to_string(case)?;
        let context_json = serde_json::to_string(&CaseContext::default())?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO cases (case_id, case_json, context_json, processing_state_json) VALUES (?1, ?2, ?3, NULL)",
                params![case.case_id, case_json, context_json],
            )
            .map_err(|e| Error::storage(e.to_string()))?;
            Ok(())
        })
    }

    fn load(&self, case_id: &str) -> Result<CaseSnapshot> {
        self.with_conn(|conn| {
            let (case_json, context_json, processing_json) = Self::load_row(conn, case_id)?;
            let case: Case = serde_json::from_str(&case_json)?;
            let context: CaseContext = serde_json::from_str(&context_json)?;
            let processing_state = match processing_json {
                Some(s) => Some(serde_json::from_str(&s)?),
                None => None,
            };
            Ok(CaseSnapshot { case, context, processing_state })
        })
    }

    fn apply_updates(&self, case_id: &str, updates: &[Update]) -> Result<()> {
        self.with_conn(|conn| {
            let (_case_json, context_json, _proc) = Self::load_row(conn, case_id)?;
            let mut context_value: serde_json::Value = serde_json::from_str(&context_json)?;

            for update in updates {
                dotpath::apply(&mut context_value, update)
                    .map_err(Error::validation)?;
            }

            // Re-parse through the typed struct so malformed updates fail fast
            // rather than being persisted as a structurally invalid document.
            let mut context: CaseContext = serde_json::from_value(context_value)?;
            context.touch();
            if !updates.is_empty() {
                let summary = serde_json::to_string(&serde_json::json!({
                    "applied": updates.len(),
                }))
                .unwrap_or_default();
                context.agent_interactions.push_log(
                    "update_case_context",
                    serde_json::json!({"paths": updates.iter().map(|u| u.path.clone()).collect::<Vec<_>>(), "summary": summary}),
                );
            }

            let new_context_json = serde_json::to_string(&context)?;
            conn.execute(
                "UPDATE cases SET context_json = ?1, updated_at = datetime('now') WHERE case_id = ?2",
                params![new_context_json, case_id],
            )
            .map_err(|e| Error::storage(e.to_string()))?;
            Ok(())
        })
    }

    fn set_status(&self, case_id: &str, status: CaseStatus) -> Result<()> {
        self.with_conn(|conn| {
            let (case_json, _context, _proc) = Self::load_row(conn, case_id)?;
            let mut case: Case = serde_json::from_str(&case_json)?;
            case.status = status;
            let updated = serde_json::to_string(&case)?;
            conn.execute(
                "UPDATE cases SET case_json = ?1, updated_at = datetime('now') WHERE case_id = ?2",
                params![updated, case_id],
            )
            .map_err(|e| Error::storage(e.to_string()))?;
            Ok(())
        })
    }

    fn set_tier(&self, case_id: &str, tier: u8) -> Result<()> {
        self.with_conn(|conn| {
            let (case_json, _context, _proc) = Self::load_row(conn, case_id)?;
            let mut case: Case = serde_json::from_str(&case_json)?;
            case.tier = Some(tier);
            let updated = serde_json::to_string(&case)?;
            conn.execute(
                "UPDATE cases SET case_json = ?1, updated_at = datetime('now') WHERE case_id = ?2",
                params![updated, case_id],
            )
            .map_err(|e| Error::storage(e.to_string()))?;
            Ok(())
        })
    }

    fn set_sessions(&self, case_id: &str, assistant_session_id: Option<String>, reasoner_session_id: Option<String>) -> Result<()> {
        self.with_conn(|conn| {
            let (case_json, _context, _proc) = Self::load_row(conn, case_id)?;
            let mut case: Case = serde_json::from_str(&case_json)?;
            if assistant_session_id.is_some() {
                case.assistant_session_id = assistant_session_id;
            }
            if reasoner_session_id.is_some() {
                case.reasoner_session_id = reasoner_session_id;
            }
            let updated = serde_json::to_string(&case)?;
            conn.execute(
                "UPDATE cases SET case_json = ?1, updated_at = datetime('now') WHERE case_id = ?2",
                params![updated, case_id],
            )
            .map_err(|e| Error::storage(e.to_string()))?;
            Ok(())
        })
    }

    fn save_processing_state(&self, case_id: &str, state: &ProcessingState) -> Result<()> {
        let state_json = serde_json::to_string(state)?;
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE cases SET processing_state_json = ?1, updated_at = datetime('now') WHERE case_id = ?2",
                params![state_json, case_id],
            )
            .map_err(|e| Error::storage(e.to_string()))?;
            Ok(())
        })
    }

    fn clear_processing_state(&self, case_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE cases SET processing_state_json = NULL, updated_at = datetime('now') WHERE case_id = ?1",
                params![case_id],
            )
            .map_err(|e| Error::storage(e.to_string()))?;
            Ok(())
        })
    }

    fn mark_webhook_event(&self, case_id: &str, event_id: &str) -> Result<bool> {
        let key = webhook_event_key(event_id);
        self.with_conn(|conn| {
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO processed_webhook_events (event_id, case_id) VALUES (?1, ?2)",
                    params![key, case_id],
                )
                .map_err(|e| Error::storage(e.to_string()))?;
            Ok(inserted == 1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::Owner;

    fn store() -> SqliteCaseStore {
        SqliteCaseStore::in_memory().unwrap()
    }

    #[test]
    fn create_and_load_round_trips() {
        let s = store();
        let case = Case::new("c1", Owner::Individual { user_id: "u1".into() });
        s.create_case(&case).unwrap();
        let snap = s.load("c1").unwrap();
        assert_eq!(snap.case.case_id, "c1");
        assert!(snap.processing_state.is_none());
    }

    #[test]
    fn load_missing_case_is_not_found() {
        let s = store();
        let err = s.load("missing").unwrap_err();
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn apply_updates_appends_and_journals() {
        let s = store();
        let case = Case::new("c1", Owner::Individual { user_id: "u1".into() });
        s.create_case(&case).unwrap();
        s.apply_updates(
            "c1",
            &[Update::append(
                "facts",
                serde_json::json!({"timestamp": chrono::Utc::now(), "source": "user", "fact": "x", "confidence": 0.9}),
            )],
        )
        .unwrap();
        let snap = s.load("c1").unwrap();
        assert_eq!(snap.context.facts.len(), 1);
        assert_eq!(snap.context.agent_interactions.log.len(), 1);
    }

    #[test]
    fn empty_updates_are_idempotent_except_last_updated() {
        let s = store();
        let case = Case::new("c1", Owner::Individual { user_id: "u1".into() });
        s.create_case(&case).unwrap();
        s.apply_updates("c1", &[]).unwrap();
        let first = s.load("c1").unwrap();
        s.apply_updates("c1", &[]).unwrap();
        let second = s.load("c1").unwrap();
        assert_eq!(first.context.facts.len(), second.context.facts.len());
        assert_eq!(first.context.agent_interactions.log.len(), second.context.agent_interactions.log.len());
    }

    #[test]
    fn processing_state_save_and_clear() {
        let s = store();
        let case = Case::new("c1", Owner::Individual { user_id: "u1".into() });
        s.create_case(&case).unwrap();
        let state = ProcessingState::new("tier-decide", "plan", serde_json::json!({}));
        s.save_processing_state("c1", &state).unwrap();
        assert!(s.load("c1").unwrap().processing_state.is_some());
        s.clear_processing_state("c1").unwrap();
        assert!(s.load("c1").unwrap().processing_state.is_none());
    }

    #[test]
    fn webhook_event_is_idempotent() {
        let s = store();
        let case = Case::new("c1", Owner::Individual { user_id: "u1".into() });
        s.create_case(&case).unwrap();
        assert!(s.mark_webhook_event("c1", "evt-1").unwrap());
        assert!(!s.mark_webhook_event("c1", "evt-1").unwrap());
    }

    #[test]
    fn set_status_and_tier() {
        let s = store();
        let case = Case::new("c1", Owner::Individual { user_id: "u1".into() });
        s.create_case(&case).unwrap();
        s.set_tier("c1", 2).unwrap();
        s.set_status("c1", CaseStatus::Active).unwrap();
        let snap = s.load("c1").unwrap();
        assert_eq!(snap.case.tier, Some(2));
        assert_eq!(snap.case.status, CaseStatus::Active);
    }
}
