//! Canonical verification verdict returned by the pipeline.

use serde::{Deserialize, Serialize};

/// What the model reported seeing on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualEvidence {
    /// Description of the observed on-screen state.
    pub observed: String,
    /// Whether the observed state matches the success criterion.
    pub matches_criteria: bool,
    /// Supporting detail for the match judgment.
    pub details: String,
}

/// Canonical output of one `analyze_screenshot` invocation.
///
/// Invariants (enforced by the normalizer, preserved by the guard):
/// - `verified == true` implies `visual_evidence.matches_criteria == true`
/// - `is_fallback == true` implies `verified == false` and `confidence == 0`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Whether the on-screen state was verified against the criterion.
    pub verified: bool,
    /// Confidence in the verdict, 0..=100.
    pub confidence: u8,
    /// Human-readable explanation of the verdict. Never empty.
    pub reason: String,
    /// Structured evidence extracted from the model reply.
    pub visual_evidence: VisualEvidence,
    /// True when this result was produced without structured evidence
    /// (unparseable reply or provider exhaustion). Fallbacks never verify.
    pub is_fallback: bool,
    /// Audit trail of conservative downgrades applied by the guard.
    pub guard_notes: Vec<String>,
    /// Id of the provider that produced the reply, or "none".
    pub provider_used: String,
}

impl VerificationResult {
    /// Safe non-verified fallback result. The only constructor allowed to
    /// set `is_fallback`; it pins `verified = false` and `confidence = 0`.
    pub fn fallback(reason: impl Into<String>, provider_used: impl Into<String>) -> Self {
        Self {
            verified: false,
            confidence: 0,
            reason: reason.into(),
            visual_evidence: VisualEvidence {
                observed: "no structured evidence available".to_string(),
                matches_criteria: false,
                details: "result synthesized without provider evidence".to_string(),
            },
            is_fallback: true,
            guard_notes: Vec::new(),
            provider_used: provider_used.into(),
        }
    }

    /// Check the cross-field invariants documented on this type.
    pub fn satisfies_invariants(&self) -> bool {
        let verified_implies_match = !self.verified || self.visual_evidence.matches_criteria;
        let fallback_is_safe = !self.is_fallback || (!self.verified && self.confidence == 0);
        verified_implies_match && fallback_is_safe && self.confidence <= 100
    }
}
