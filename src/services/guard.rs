//! Anti-hallucination guards.
//!
//! Vision models reward-hack verification: asked "is the video playing?",
//! they answer yes because a video player is visible, not because playback
//! evidence exists. The guard re-reads the evidence text for specific
//! criterion families and downgrades verified verdicts whose evidence never
//! mentions a single concrete indicator.
//!
//! Guards only ever downgrade. A non-verified result passes through
//! untouched, and guard notes are appended, never overwritten.

use tracing::info;

use crate::domain::models::{AnalysisContext, GuardConfig, VerificationResult};

/// Post-normalization plausibility checks on verified verdicts.
pub struct VerificationGuard {
    config: GuardConfig,
}

impl VerificationGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self { config }
    }

    /// Apply all guards in place.
    pub fn apply(
        &self,
        result: &mut VerificationResult,
        success_criterion: &str,
        context: &AnalysisContext,
    ) {
        if !result.verified {
            return;
        }

        let criterion = success_criterion.to_lowercase();
        let evidence = collect_evidence(result, context);

        self.check_family(
            result,
            &criterion,
            &evidence,
            &self.config.playback_criterion_cues,
            &self.config.playback_indicators,
            "playback claim lacked any player evidence (no controls, progress bar, or timestamps mentioned)",
        );
        self.check_family(
            result,
            &criterion,
            &evidence,
            &self.config.fullscreen_criterion_cues,
            &self.config.fullscreen_indicators,
            "fullscreen claim lacked any fullscreen evidence (no edge-to-edge or missing-chrome cues mentioned)",
        );
    }

    /// Downgrade when the criterion belongs to a guarded family but the
    /// evidence contains none of the family's indicators.
    fn check_family(
        &self,
        result: &mut VerificationResult,
        criterion: &str,
        evidence: &str,
        cues: &[String],
        indicators: &[String],
        note: &str,
    ) {
        if !result.verified {
            return;
        }
        let family_applies = cues.iter().any(|cue| criterion.contains(cue.as_str()));
        if !family_applies {
            return;
        }
        let supported = indicators.iter().any(|ind| evidence.contains(ind.as_str()));
        if supported {
            return;
        }

        info!(note, "guard downgraded a verified verdict");
        result.verified = false;
        result.confidence = result.confidence.min(self.config.confidence_ceiling);
        result.guard_notes.push(note.to_string());
    }
}

/// All text the guard may search for indicators, lowercased: the model's
/// reason and evidence plus the caller's execution history.
fn collect_evidence(result: &VerificationResult, context: &AnalysisContext) -> String {
    let mut parts = vec![
        result.reason.clone(),
        result.visual_evidence.observed.clone(),
        result.visual_evidence.details.clone(),
    ];
    parts.extend(context.execution_history.iter().cloned());
    parts.join("\n").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::VisualEvidence;

    fn guard() -> VerificationGuard {
        VerificationGuard::new(GuardConfig::default())
    }

    fn verified_result(observed: &str, details: &str) -> VerificationResult {
        VerificationResult {
            verified: true,
            confidence: 90,
            reason: "criterion appears satisfied".to_string(),
            visual_evidence: VisualEvidence {
                observed: observed.to_string(),
                matches_criteria: true,
                details: details.to_string(),
            },
            is_fallback: false,
            guard_notes: Vec::new(),
            provider_used: "p".to_string(),
        }
    }

    #[test]
    fn test_playback_claim_without_evidence_is_downgraded() {
        let mut result = verified_result("a video player page", "the page has loaded");
        guard().apply(&mut result, "the video is playing", &AnalysisContext::default());

        assert!(!result.verified);
        assert!(result.confidence <= 25);
        assert_eq!(result.guard_notes.len(), 1);
        assert!(result.satisfies_invariants());
    }

    #[test]
    fn test_playback_claim_with_evidence_passes() {
        let mut result = verified_result(
            "video player with a progress bar advancing",
            "pause button visible in the control row",
        );
        guard().apply(&mut result, "the video is playing", &AnalysisContext::default());

        assert!(result.verified);
        assert_eq!(result.confidence, 90);
        assert!(result.guard_notes.is_empty());
    }

    #[test]
    fn test_spanish_evidence_counts() {
        let mut result = verified_result(
            "reproductor de video con barra de progreso",
            "se ve el bot\u{f3}n de pausa",
        );
        guard().apply(&mut result, "the video is playing", &AnalysisContext::default());
        assert!(result.verified);
    }

    #[test]
    fn test_execution_history_counts_as_evidence() {
        let mut result = verified_result("a video page", "nothing specific");
        let context = AnalysisContext {
            execution_history: vec!["player controls appeared with a seek bar".to_string()],
            ..Default::default()
        };
        guard().apply(&mut result, "the video is playing", &context);
        assert!(result.verified);
    }

    #[test]
    fn test_fullscreen_claim_without_evidence_is_downgraded() {
        let mut result = verified_result("a video playing in a window", "progress bar visible");
        guard().apply(
            &mut result,
            "the video is in fullscreen mode",
            &AnalysisContext::default(),
        );

        assert!(!result.verified);
        assert!(result
            .guard_notes
            .iter()
            .any(|n| n.contains("fullscreen")));
    }

    #[test]
    fn test_unrelated_criterion_is_untouched() {
        let mut result = verified_result("a login form", "username field filled");
        guard().apply(&mut result, "the login page is shown", &AnalysisContext::default());
        assert!(result.verified);
        assert_eq!(result.confidence, 90);
    }

    #[test]
    fn test_unverified_results_pass_through() {
        let mut result = verified_result("irrelevant", "irrelevant");
        result.verified = false;
        result.confidence = 40;
        guard().apply(&mut result, "the video is playing", &AnalysisContext::default());

        // No downgrade, no notes, confidence untouched.
        assert_eq!(result.confidence, 40);
        assert!(result.guard_notes.is_empty());
    }

    #[test]
    fn test_notes_are_appended_not_overwritten() {
        let mut result = verified_result("a video page", "nothing specific");
        result.guard_notes.push("earlier note".to_string());
        guard().apply(&mut result, "the video is playing", &AnalysisContext::default());

        assert_eq!(result.guard_notes.len(), 2);
        assert_eq!(result.guard_notes[0], "earlier note");
    }
}
