//! Tier-hint keyword classifier (spec §9: "the tier-decide node's output is
//! LLM-driven and should be treated as a hint, not an assertion"). Ported
//! from the teacher's `PatternClassifier`/`TaskComplexitySignals` idiom and
//! re-targeted at the three legal-case tiers instead of code-task
//! complexity.

use regex::Regex;
use std::sync::LazyLock;

static INSOLVENCY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)insolven|faliment|lichidare judiciara").unwrap());
static LITIGATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)instan[tţ]a|proces|litigiu|apel|recurs").unwrap());
static CONTRACT_DISPUTE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)contract|clauza|neexecutare|reziliere").unwrap());
static MULTI_PARTY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)parteneri|actionari|asociati|mai multe (firme|companii)").unwrap());
static SIMPLE_FINE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)amenda|contravent|circulatie").unwrap());
static SIMPLE_QUESTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)o singura intrebare|rapid|simplu").unwrap());

/// Signals extracted from the user's initial case description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TierSignals {
    pub insolvency: bool,
    pub litigation: bool,
    pub contract_dispute: bool,
    pub multi_party: bool,
    pub simple_fine: bool,
    pub simple_question: bool,
    pub description_len: usize,
}

impl TierSignals {
    /// Weighted score: higher means more complex. Mirrors the teacher's
    /// `TaskComplexitySignals::score()` idiom (+weight per signal).
    pub fn score(&self) -> i32 {
        let mut score = 0;
        if self.insolvency {
            score += 3;
        }
        if self.multi_party {
            score += 2;
        }
        if self.litigation {
            score += 2;
        }
        if self.contract_dispute {
            score += 1;
        }
        if self.simple_fine {
            score -= 2;
        }
        if self.simple_question {
            score -= 1;
        }
        score
    }

    pub fn active_signals(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.insolvency {
            out.push("insolvency");
        }
        if self.litigation {
            out.push("litigation");
        }
        if self.contract_dispute {
            out.push("contract_dispute");
        }
        if self.multi_party {
            out.push("multi_party");
        }
        if self.simple_fine {
            out.push("simple_fine");
        }
        if self.simple_question {
            out.push("simple_question");
        }
        out
    }
}

/// A non-authoritative tier hint with the justification string attached to
/// node metadata/prompts.
#[derive(Debug, Clone, PartialEq)]
pub struct TierHint {
    pub tier: u8,
    pub reason: String,
    pub signals: TierSignals,
}

pub struct TierClassifier;

impl TierClassifier {
    pub fn analyze(description: &str) -> TierSignals {
        TierSignals {
            insolvency: INSOLVENCY_PATTERN.is_match(description),
            litigation: LITIGATION_PATTERN.is_match(description),
            contract_dispute: CONTRACT_DISPUTE_PATTERN.is_match(description),
            multi_party: MULTI_PARTY_PATTERN.is_match(description),
            simple_fine: SIMPLE_FINE_PATTERN.is_match(description),
            simple_question: SIMPLE_QUESTION_PATTERN.is_match(description),
            description_len: description.len(),
        }
    }

    /// Hint only — downstream nodes must tolerate misclassification
    /// (spec §9).
    pub fn hint(description: &str) -> TierHint {
        let signals = Self::analyze(description);
        let score = signals.score();
        let (tier, reason) = if score >= 4 {
            (3, format!("complexity_score:{score}:{}", signals.active_signals().join("+")))
        } else if score >= 1 {
            (2, format!("complexity_score:{score}:{}", signals.active_signals().join("+")))
        } else if signals.description_len < 8 {
            (1, "description_too_short".to_string())
        } else {
            (1, format!("complexity_score:{score}:simple_task"))
        };
        TierHint { tier, reason, signals }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_fine_hints_tier_one() {
        let hint = TierClassifier::hint("Am primit o amenda de circulatie de 500 lei");
        assert_eq!(hint.tier, 1);
    }

    #[test]
    fn insolvency_hints_tier_three() {
        let hint = TierClassifier::hint("Am nevoie de ajutor cu un caz de insolventa complex cu mai multe firme");
        assert_eq!(hint.tier, 3);
    }

    #[test]
    fn contract_dispute_hints_tier_two() {
        let hint = TierClassifier::hint("Am o problema cu o clauza din contractul de inchiriere");
        assert_eq!(hint.tier, 2);
    }

    #[test]
    fn score_combines_signals() {
        let signals = TierSignals { insolvency: true, multi_party: true, ..Default::default() };
        assert_eq!(signals.score(), 5);
    }
}
