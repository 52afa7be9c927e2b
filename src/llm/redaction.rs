//! PII redaction check applied to every outgoing prompt (spec §4.3, §8).
//!
//! Two independent checks, either of which is fatal: a format scan for
//! national-id/fiscal-code-shaped substrings, and a direct substring match
//! against the field values of parties attached to the case.

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

static NATIONAL_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{13}\b").unwrap());
static RO_FISCAL_CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bRO\d+\b").unwrap());
static TRADE_REGISTRY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bJ\d+/\d+/\d+\b").unwrap());

/// Scan `text` for strings that match the national-id or fiscal-code
/// formats named in spec §8 (13-digit sequences, `RO\d+`, `J\d+/\d+/\d+`).
pub fn scan_for_pii_formats(text: &str) -> Option<&'static str> {
    if NATIONAL_ID_PATTERN.is_match(text) {
        return Some("national_id_format");
    }
    if RO_FISCAL_CODE_PATTERN.is_match(text) {
        return Some("ro_fiscal_code_format");
    }
    if TRADE_REGISTRY_PATTERN.is_match(text) {
        return Some("trade_registry_format");
    }
    None
}

/// Check `text` against the actual field values of parties attached to the
/// case (spec §8: "no substring equals any field value stored in the party
/// store for any party attached to the case").
pub fn scan_for_attached_party_values<'a>(text: &str, party_values: &[&'a str]) -> Option<&'a str> {
    party_values.iter().copied().find(|v| v.len() >= 4 && text.contains(v))
}

/// Run both checks over every message in a prompt bundle, failing fatally
/// and without issuing any partial LLM call (spec §7: PII violation skips
/// the escalation ladder and is reported immediately).
pub fn redaction_check(texts: &[&str], attached_party_values: &[&str]) -> Result<()> {
    for text in texts {
        if let Some(kind) = scan_for_pii_formats(text) {
            return Err(Error::pii_violation(format!("matched {kind} pattern")));
        }
        if let Some(value) = scan_for_attached_party_values(text, attached_party_values) {
            return Err(Error::pii_violation(format!("matched party field value ({} chars)", value.len())));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_national_id_digit_sequence() {
        assert_eq!(scan_for_pii_formats("id-ul e 1234567890123 multumesc"), Some("national_id_format"));
    }

    #[test]
    fn detects_ro_fiscal_code() {
        assert_eq!(scan_for_pii_formats("CUI RO123456"), Some("ro_fiscal_code_format"));
    }

    #[test]
    fn detects_trade_registry_number() {
        assert_eq!(scan_for_pii_formats("J40/1234/2020"), Some("trade_registry_format"));
    }

    #[test]
    fn clean_text_passes() {
        assert_eq!(scan_for_pii_formats("Buna ziua, am o intrebare despre contract."), None);
    }

    #[test]
    fn detects_party_field_substring() {
        let values = ["Popescu", "Str. Exemplu nr. 1"];
        assert_eq!(scan_for_attached_party_values("clientul Popescu a cerut", &values), Some("Popescu"));
    }

    #[test]
    fn redaction_check_is_fatal_and_stops_at_first_hit() {
        let err = redaction_check(&["numarul 1234567890123"], &[]).unwrap_err();
        assert!(matches!(err, Error::PiiViolation { .. }));
    }

    #[test]
    fn redaction_check_passes_clean_bundle() {
        assert!(redaction_check(&["Buna ziua", "Va multumesc"], &["Popescu"]).is_ok());
    }
}
