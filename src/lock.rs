//! Per-case single-writer lock with lease (spec §5, §4.6).
//!
//! No direct teacher precedent for this component; built fresh, following
//! the `Arc<Mutex<...>>` guard idiom the teacher uses throughout
//! `memory/store.rs`. A lease older than `max_invocation + grace` may be
//! stolen to recover from crashed invocations.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct Lease {
    holder: String,
    acquired_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// In-process single-writer lock registry, keyed by `case_id`. A real
/// deployment backs this with the `lock_leases` table (`store/schema.rs`)
/// so contention is visible across server processes; this in-memory form
/// is what a single process needs and is what the request handler uses
/// directly.
pub struct CaseLock {
    leases: Mutex<HashMap<String, Lease>>,
}

/// RAII guard: releases the lease when dropped.
pub struct LockGuard<'a> {
    lock: &'a CaseLock,
    case_id: String,
    holder: String,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let mut leases = self.lock.leases.lock().unwrap();
        if let Some(lease) = leases.get(&self.case_id) {
            if lease.holder == self.holder {
                leases.remove(&self.case_id);
                tracing::debug!(case_id = self.case_id.as_str(), holder = self.holder.as_str(), "case lock released");
            }
        }
    }
}

impl CaseLock {
    pub fn new() -> Self {
        Self { leases: Mutex::new(HashMap::new()) }
    }

    /// Acquire the lock for `case_id`. Returns `None` (maps to
    /// `{status: busy}`) if another live holder has it; a holder whose
    /// lease has expired is stolen.
    pub fn try_acquire(&self, case_id: &str, holder: impl Into<String>, lease_duration: std::time::Duration) -> Option<LockGuard<'_>> {
        let holder = holder.into();
        let now = Utc::now();
        let mut leases = self.leases.lock().unwrap();

        if let Some(existing) = leases.get(&*case_id) {
            if existing.expires_at > now {
                tracing::debug!(case_id, holder = existing.holder.as_str(), "case lock busy");
                return None;
            }
            tracing::warn!(case_id, expired_holder = existing.holder.as_str(), new_holder = holder.as_str(), "stealing expired case lease");
        }

        let lease_chrono = ChronoDuration::from_std(lease_duration).unwrap_or(ChronoDuration::seconds(600));
        leases.insert(
            case_id.to_string(),
            Lease { holder: holder.clone(), acquired_at: now, expires_at: now + lease_chrono },
        );
        tracing::debug!(case_id, holder = holder.as_str(), "case lock acquired");
        Some(LockGuard { lock: self, case_id: case_id.to_string(), holder })
    }

    pub fn is_locked(&self, case_id: &str) -> bool {
        let now = Utc::now();
        self.leases
            .lock()
            .unwrap()
            .get(case_id)
            .map(|l| l.expires_at > now)
            .unwrap_or(false)
    }
}

impl Default for CaseLock {
    fn default() -> Self {
        Self::new()
    }
}
