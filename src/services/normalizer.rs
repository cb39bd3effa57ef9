//! Cascading response normalization.
//!
//! Vision models rarely honor "pure JSON only". The normalizer runs a
//! fixed cascade of parsing strategies over the raw reply, from strictest
//! to most forgiving, and converts the first hit into a canonical
//! [`VerificationResult`]. When every strategy misses, or the router was
//! exhausted, the output is a safe non-verified fallback.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::domain::models::{NormalizerConfig, VerificationResult, VisualEvidence};
use crate::services::provider_router::RouteOutcome;

const NOT_PROVIDED: &str = "not provided";

/// Fields recovered from a raw reply before canonicalization. Every field
/// is optional; canonicalization fills the gaps conservatively.
#[derive(Debug, Clone, Default, PartialEq)]
struct ParsedVerdict {
    verified: Option<bool>,
    confidence: Option<u8>,
    reason: Option<String>,
    observed: Option<String>,
    matches_criteria: Option<bool>,
    details: Option<String>,
}

impl ParsedVerdict {
    /// A verdict is usable only if at least one judgment field was found.
    /// Free text that merely mentions a reason is not evidence.
    fn is_usable(&self) -> bool {
        self.verified.is_some() || self.confidence.is_some() || self.matches_criteria.is_some()
    }
}

/// Parsing strategies, strictest first. Order matters: a strict JSON reply
/// must never be degraded by a lossier tier.
const STRATEGIES: &[(&str, fn(&str) -> Option<ParsedVerdict>)] = &[
    ("strict-json", parse_strict_json),
    ("embedded-json", parse_embedded_json),
    ("repaired-json", parse_repaired_json),
    ("labeled-text", parse_labeled_text),
];

/// Converts raw provider replies into canonical verification results.
pub struct ResponseNormalizer {
    config: NormalizerConfig,
}

impl ResponseNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Normalize a routing outcome. Exhaustion becomes a fallback result.
    pub fn normalize(&self, outcome: RouteOutcome) -> VerificationResult {
        match outcome {
            RouteOutcome::Replied {
                raw_text,
                provider_id,
            } => self.normalize_text(&raw_text, &provider_id),
            RouteOutcome::Exhausted => VerificationResult::fallback(
                "all configured providers were unavailable or failed",
                "none",
            ),
        }
    }

    /// Run the strategy cascade over raw reply text.
    #[instrument(skip_all, fields(provider = provider_id))]
    pub fn normalize_text(&self, raw_text: &str, provider_id: &str) -> VerificationResult {
        for (name, strategy) in STRATEGIES {
            if let Some(parsed) = strategy(raw_text) {
                if parsed.is_usable() {
                    debug!(strategy = name, "reply parsed");
                    return self.canonicalize(parsed, provider_id);
                }
            }
        }

        warn!(reply_len = raw_text.len(), "no strategy could parse the reply");
        VerificationResult::fallback(
            "provider reply contained no recognizable verdict",
            provider_id,
        )
    }

    /// Fill gaps and enforce cross-field invariants.
    fn canonicalize(&self, parsed: ParsedVerdict, provider_id: &str) -> VerificationResult {
        let mut verified = parsed.verified.unwrap_or(false);
        // Evidence defaults to agreeing with the verdict; an explicit
        // mismatch from the model downgrades the verdict instead.
        let matches_criteria = parsed.matches_criteria.unwrap_or(verified);
        if verified && !matches_criteria {
            verified = false;
        }

        let confidence = parsed.confidence.map_or_else(
            || {
                if matches_criteria {
                    self.config.matched_default_confidence
                } else {
                    self.config.unmatched_default_confidence
                }
            },
            |c| c.min(100),
        );

        let non_empty = |s: Option<String>| {
            s.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| NOT_PROVIDED.to_string())
        };

        VerificationResult {
            verified,
            confidence,
            reason: non_empty(parsed.reason),
            visual_evidence: VisualEvidence {
                observed: non_empty(parsed.observed),
                matches_criteria,
                details: non_empty(parsed.details),
            },
            is_fallback: false,
            guard_notes: Vec::new(),
            provider_used: provider_id.to_string(),
        }
    }
}

/// Tier 1: the whole reply is a JSON object, possibly inside code fences.
fn parse_strict_json(raw: &str) -> Option<ParsedVerdict> {
    let trimmed = strip_code_fences(raw.trim());
    let value: Value = serde_json::from_str(trimmed).ok()?;
    extract_verdict(&value)
}

/// Tier 2: a JSON object is embedded in surrounding prose. Scans for
/// balanced top-level objects and takes the first one that yields a verdict.
fn parse_embedded_json(raw: &str) -> Option<ParsedVerdict> {
    for start in raw.char_indices().filter(|(_, c)| *c == '{').map(|(i, _)| i) {
        if let Some(end) = find_balanced_end(&raw[start..]) {
            let candidate = &raw[start..start + end];
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                if let Some(verdict) = extract_verdict(&value) {
                    if verdict.is_usable() {
                        return Some(verdict);
                    }
                }
            }
        }
    }
    None
}

/// Tier 3: the reply looks like JSON but breaks the grammar. Repairs the
/// common model mistakes (single quotes, unquoted keys, trailing commas)
/// and retries the stricter tiers on the repaired text.
fn parse_repaired_json(raw: &str) -> Option<ParsedVerdict> {
    static UNQUOTED_KEY: OnceLock<Regex> = OnceLock::new();
    static TRAILING_COMMA: OnceLock<Regex> = OnceLock::new();

    let unquoted_key =
        UNQUOTED_KEY.get_or_init(|| literal_regex(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:"));
    let trailing_comma = TRAILING_COMMA.get_or_init(|| literal_regex(r",\s*([}\]])"));

    let mut repaired = strip_code_fences(raw.trim()).replace('\'', "\"");
    repaired = unquoted_key.replace_all(&repaired, "$1\"$2\":").into_owned();
    repaired = trailing_comma.replace_all(&repaired, "$1").into_owned();

    parse_strict_json(&repaired).or_else(|| parse_embedded_json(&repaired))
}

/// Tier 4: labeled plain text, e.g. "Verified: yes" / "Confidence: 85".
fn parse_labeled_text(raw: &str) -> Option<ParsedVerdict> {
    static VERIFIED: OnceLock<Regex> = OnceLock::new();
    static CONFIDENCE: OnceLock<Regex> = OnceLock::new();
    static REASON: OnceLock<Regex> = OnceLock::new();
    static OBSERVED: OnceLock<Regex> = OnceLock::new();
    static DETAILS: OnceLock<Regex> = OnceLock::new();

    let verified_re =
        VERIFIED.get_or_init(|| literal_regex(r"(?im)^\s*\**\s*verified\s*\**\s*[:=]\s*(\w+)"));
    let confidence_re = CONFIDENCE
        .get_or_init(|| literal_regex(r"(?im)^\s*\**\s*confidence\s*\**\s*[:=]\s*(\d{1,3})"));
    let reason_re =
        REASON.get_or_init(|| literal_regex(r"(?im)^\s*\**\s*reason\s*\**\s*[:=]\s*(.+)$"));
    let observed_re =
        OBSERVED.get_or_init(|| literal_regex(r"(?im)^\s*\**\s*observed\s*\**\s*[:=]\s*(.+)$"));
    let details_re =
        DETAILS.get_or_init(|| literal_regex(r"(?im)^\s*\**\s*details\s*\**\s*[:=]\s*(.+)$"));

    let mut verdict = ParsedVerdict::default();

    if let Some(caps) = verified_re.captures(raw) {
        verdict.verified = Some(is_affirmative(&caps[1]));
    }
    if let Some(caps) = confidence_re.captures(raw) {
        verdict.confidence = caps[1].parse::<u8>().ok().map(|c| c.min(100));
    }
    if let Some(caps) = reason_re.captures(raw) {
        verdict.reason = Some(caps[1].trim().to_string());
    }
    if let Some(caps) = observed_re.captures(raw) {
        verdict.observed = Some(caps[1].trim().to_string());
    }
    if let Some(caps) = details_re.captures(raw) {
        verdict.details = Some(caps[1].trim().to_string());
    }

    if verdict == ParsedVerdict::default() {
        None
    } else {
        Some(verdict)
    }
}

/// Compile a regex literal. Only called with patterns that are known to be
/// valid at compile time.
#[allow(clippy::expect_used)]
fn literal_regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("regex literal is valid")
}

fn is_affirmative(word: &str) -> bool {
    matches!(
        word.to_lowercase().as_str(),
        "yes" | "true" | "verified" | "correct" | "confirmed" | "si" | "s\u{ed}"
    )
}

/// Strip a leading/trailing markdown code fence, with or without a
/// language tag.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag line if present.
    let rest = rest
        .split_once('\n')
        .map_or(rest.trim_start_matches(|c: char| c.is_alphanumeric()), |(_, body)| body);
    rest.trim().trim_end_matches("```").trim()
}

/// Find the byte offset one past the matching close brace for a string
/// starting with '{'. String-aware: braces inside quoted values are ignored.
fn find_balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0u32;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Pull verdict fields out of a parsed JSON value. Accepts camelCase and
/// snake_case keys, top-level or nested under `visualEvidence`.
fn extract_verdict(value: &Value) -> Option<ParsedVerdict> {
    let obj = value.as_object()?;

    let get = |keys: &[&str]| keys.iter().find_map(|k| obj.get(*k));
    let evidence = get(&["visualEvidence", "visual_evidence"]).and_then(Value::as_object);
    let get_evidence = |keys: &[&str]| {
        evidence
            .and_then(|ev| keys.iter().find_map(|k| ev.get(*k)))
            .or_else(|| get(keys))
    };

    let verdict = ParsedVerdict {
        verified: get(&["verified", "success", "passed"]).and_then(as_bool),
        confidence: get(&["confidence", "confidence_score", "confidenceScore"])
            .and_then(as_confidence),
        reason: get(&["reason", "explanation"]).and_then(as_string),
        observed: get_evidence(&["observed", "observation"]).and_then(as_string),
        matches_criteria: get_evidence(&["matchesCriteria", "matches_criteria", "matches"])
            .and_then(as_bool),
        details: get_evidence(&["details", "detail"]).and_then(as_string),
    };

    Some(verdict)
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => Some(is_affirmative(s)),
        _ => None,
    }
}

fn as_string(value: &Value) -> Option<String> {
    value.as_str().map(ToString::to_string)
}

/// Confidence may arrive as an integer percentage, a numeric string, or a
/// 0.0..=1.0 fraction. Everything is mapped onto 0..=100.
fn as_confidence(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_u64() {
                Some(u8::try_from(i.min(100)).unwrap_or(100))
            } else {
                n.as_f64().map(|f| {
                    let scaled = if (0.0..=1.0).contains(&f) { f * 100.0 } else { f };
                    scaled.round().clamp(0.0, 100.0) as u8
                })
            }
        }
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok().map(|f| {
            let scaled = if (0.0..=1.0).contains(&f) && s.contains('.') { f * 100.0 } else { f };
            scaled.round().clamp(0.0, 100.0) as u8
        }),
        _ => None,
    }
}
