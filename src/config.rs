//! Runtime configuration for the orchestrator core.

use serde::{Deserialize, Serialize};

/// Recognized configuration options (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Hard cap on orchestrator iterations per request.
    pub max_nodes_per_request: u32,
    /// Reserve, in seconds, before the orchestrator forces a suspend.
    pub deadline_slack_seconds: u64,
    /// Per-query record cap returned by `research_query`.
    pub research_summary_limit: u32,
    /// Number of `considered` legislation entries that forces a prune.
    pub consideration_prune_threshold: u32,
    /// Maximum context digest size fed to the Assistant.
    pub assistant_context_budget_bytes: usize,
    /// Additional retry attempts for transient backend failures.
    pub retry_attempts_transient: u32,
    /// Languages the request handler will translate user-facing text into.
    pub supported_user_languages: Vec<String>,
    /// Lease duration before a crashed invocation's lock may be stolen.
    pub lock_lease_grace_seconds: u64,
    /// Maximum invocation wall-clock budget, used to size the lease.
    pub max_invocation_seconds: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_nodes_per_request: 20,
            deadline_slack_seconds: 20,
            research_summary_limit: 10,
            consideration_prune_threshold: 20,
            assistant_context_budget_bytes: 65_536,
            retry_attempts_transient: 3,
            supported_user_languages: vec!["ro".to_string(), "en".to_string()],
            lock_lease_grace_seconds: 600,
            max_invocation_seconds: 0,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| crate::error::Error::internal(format!("reading config: {e}")))?;
        Self::from_toml_str(&text)
            .map_err(|e| crate::error::Error::validation(format!("invalid config: {e}")))
    }

    /// Total lease duration: invocation budget plus grace period (§5).
    pub fn lease_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.max_invocation_seconds + self.lock_lease_grace_seconds)
    }

    /// Retry backoff schedule: base 500ms, capped at 8s, exponential.
    pub fn backoff_for_attempt(&self, attempt: u32) -> std::time::Duration {
        let base_ms: u64 = 500;
        let cap_ms: u64 = 8_000;
        let ms = base_ms.saturating_mul(1u64 << attempt.min(8)).min(cap_ms);
        std::time::Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.max_nodes_per_request, 20);
        assert_eq!(cfg.deadline_slack_seconds, 20);
        assert_eq!(cfg.research_summary_limit, 10);
        assert_eq!(cfg.consideration_prune_threshold, 20);
        assert_eq!(cfg.assistant_context_budget_bytes, 65_536);
        assert_eq!(cfg.retry_attempts_transient, 3);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg = OrchestratorConfig::from_toml_str("max_nodes_per_request = 5\n").unwrap();
        assert_eq!(cfg.max_nodes_per_request, 5);
        assert_eq!(cfg.deadline_slack_seconds, 20);
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.backoff_for_attempt(0).as_millis(), 500);
        assert_eq!(cfg.backoff_for_attempt(1).as_millis(), 1000);
        assert_eq!(cfg.backoff_for_attempt(10).as_millis(), 8000);
    }
}
