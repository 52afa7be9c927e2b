//! Party store (spec §3, §6): holds PII. Accessed only by the PDF-generation
//! tool (`generate_draft`), never by any code path that assembles LLM prompts.

use crate::error::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub party_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub organization_name: Option<String>,
    pub national_id: Option<String>,
    pub fiscal_code: Option<String>,
    pub registered_address: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

impl Party {
    /// All PII field values, used by the redaction check to scan outgoing
    /// prompts for substring leaks (spec §8).
    pub fn pii_values(&self) -> Vec<&str> {
        [
            self.first_name.as_deref(),
            self.last_name.as_deref(),
            self.organization_name.as_deref(),
            self.national_id.as_deref(),
            self.fiscal_code.as_deref(),
            self.registered_address.as_deref(),
            self.contact_email.as_deref(),
            self.contact_phone.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|v| !v.is_empty())
        .collect()
    }

    /// Resolve a single `{{partyN.field}}` placeholder field name.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "first_name" => self.first_name.as_deref(),
            "last_name" => self.last_name.as_deref(),
            "organization_name" => self.organization_name.as_deref(),
            "national_id" => self.national_id.as_deref(),
            "fiscal_code" => self.fiscal_code.as_deref(),
            "registered_address" => self.registered_address.as_deref(),
            "contact_email" => self.contact_email.as_deref(),
            "contact_phone" => self.contact_phone.as_deref(),
            _ => None,
        }
    }
}

pub trait PartyStore: Send + Sync {
    fn upsert(&self, party: &Party) -> Result<()>;
    fn get(&self, party_id: &str) -> Result<Party>;
}

pub struct SqlitePartyStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePartyStore {
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::storage(e.to_string()))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS parties (party_id TEXT PRIMARY KEY, party_json TEXT NOT NULL)",
            [],
        )
        .map_err(|e| Error::storage(e.to_string()))?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }
}

impl PartyStore for SqlitePartyStore {
    fn upsert(&self, party: &Party) -> Result<()> {
        let json = serde_json::to_string(party)?;
        let conn = self.conn.lock().map_err(|_| Error::internal("party store mutex poisoned"))?;
        conn.execute(
            "INSERT INTO parties (party_id, party_json) VALUES (?1, ?2)
             ON CONFLICT(party_id) DO UPDATE SET party_json = excluded.party_json",
            params![party.party_id, json],
        )
        .map_err(|e| Error::storage(e.to_string()))?;
        Ok(())
    }

    fn get(&self, party_id: &str) -> Result<Party> {
        let conn = self.conn.lock().map_err(|_| Error::internal("party store mutex poisoned"))?;
        let json: Option<String> = conn
            .query_row("SELECT party_json FROM parties WHERE party_id = ?1", params![party_id], |row| row.get(0))
            .optional()
            .map_err(|e| Error::storage(e.to_string()))?;
        let json = json.ok_or_else(|| Error::not_found("party", party_id))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Resolve `{{partyN.field}}` placeholders against the party store,
/// restricted to parties attached to the case (spec §6
/// `resolve_party_for_pdf`).
pub fn resolve_party_for_pdf(
    store: &dyn PartyStore,
    attached_party_ids: &[String],
    party_id: &str,
    fields: &[String],
) -> Result<std::collections::HashMap<String, String>> {
    if !attached_party_ids.iter().any(|id| id == party_id) {
        return Err(Error::authorization(format!(
            "party {party_id} is not attached to this case"
        )));
    }
    let party = store.get(party_id)?;
    let mut values = std::collections::HashMap::new();
    for field in fields {
        if let Some(v) = party.field(field) {
            values.insert(field.clone(), v.to_string());
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_party(id: &str) -> Party {
        Party {
            party_id: id.into(),
            first_name: Some("Ion".into()),
            last_name: Some("Popescu".into()),
            organization_name: None,
            national_id: Some("1234567890123".into()),
            fiscal_code: Some("RO123456".into()),
            registered_address: Some("Str. Exemplu nr. 1".into()),
            contact_email: Some("ion@example.com".into()),
            contact_phone: Some("0712345678".into()),
        }
    }

    #[test]
    fn resolve_rejects_unattached_party() {
        let store = SqlitePartyStore::in_memory().unwrap();
        store.upsert(&sample_party("party0")).unwrap();
        let err = resolve_party_for_pdf(&store, &["party1".into()], "party0", &["last_name".into()]).unwrap_err();
        assert_eq!(err.http_status(), 403);
    }

    #[test]
    fn resolve_returns_requested_fields() {
        let store = SqlitePartyStore::in_memory().unwrap();
        store.upsert(&sample_party("party0")).unwrap();
        let values = resolve_party_for_pdf(
            &store,
            &["party0".into()],
            "party0",
            &["last_name".into(), "fiscal_code".into()],
        )
        .unwrap();
        assert_eq!(values.get("last_name").unwrap(), "Popescu");
        assert_eq!(values.get("fiscal_code").unwrap(), "RO123456");
    }

    #[test]
    fn pii_values_excludes_empty_fields() {
        let party = sample_party("party0");
        let values = party.pii_values();
        assert!(values.contains(&"Popescu"));
        assert!(values.contains(&"1234567890123"));
    }
}
