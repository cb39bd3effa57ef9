//! Property tests for the response normalizer.

use proptest::prelude::*;
use veriscope::domain::models::NormalizerConfig;
use veriscope::services::ResponseNormalizer;

proptest! {
    /// Arbitrary reply text can never produce an invariant-violating
    /// result: the cascade either extracts a consistent verdict or falls
    /// back safely.
    #[test]
    fn arbitrary_text_yields_consistent_results(raw in ".{0,400}") {
        let normalizer = ResponseNormalizer::new(NormalizerConfig::default());
        let result = normalizer.normalize_text(&raw, "prop");

        prop_assert!(result.satisfies_invariants());
        prop_assert!(result.confidence <= 100);
        prop_assert!(!result.reason.is_empty());
        if result.is_fallback {
            prop_assert!(!result.verified);
            prop_assert_eq!(result.confidence, 0);
        }
    }

    /// Well-formed JSON replies always survive the strict tier with their
    /// values intact.
    #[test]
    fn well_formed_json_is_parsed_faithfully(
        verified in any::<bool>(),
        confidence in 0u8..=100,
    ) {
        let raw = format!(
            r#"{{"verified": {verified}, "confidence": {confidence}, "reason": "r", "visualEvidence": {{"observed": "o", "matchesCriteria": {verified}, "details": "d"}}}}"#
        );
        let normalizer = ResponseNormalizer::new(NormalizerConfig::default());
        let result = normalizer.normalize_text(&raw, "prop");

        prop_assert!(!result.is_fallback);
        prop_assert_eq!(result.verified, verified);
        prop_assert_eq!(result.confidence, confidence);
        prop_assert!(result.satisfies_invariants());
    }

    /// Out-of-range confidence values are clamped, never rejected.
    #[test]
    fn oversized_confidence_is_clamped(confidence in 101u32..10_000) {
        let raw = format!(r#"{{"verified": false, "confidence": {confidence}}}"#);
        let normalizer = ResponseNormalizer::new(NormalizerConfig::default());
        let result = normalizer.normalize_text(&raw, "prop");

        prop_assert!(!result.is_fallback);
        prop_assert_eq!(result.confidence, 100);
    }
}
