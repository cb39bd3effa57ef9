//! Input types for one verification invocation.

use serde::{Deserialize, Serialize};

/// Free-form hints supplied by the calling agent alongside the screenshot.
///
/// All fields are optional; the pipeline works with a bare screenshot and
/// criterion. History hints improve both the prompt and the guard's ability
/// to find supporting evidence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisContext {
    /// The action the agent just performed (e.g. "clicked the play button").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Recent execution history lines, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub execution_history: Vec<String>,

    /// Prior actions taken before the current one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_actions: Vec<String>,

    /// Optional hint about which model the caller would prefer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_hint: Option<String>,
}

impl AnalysisContext {
    /// True when no hint of any kind was provided.
    pub fn is_empty(&self) -> bool {
        self.action.is_none()
            && self.execution_history.is_empty()
            && self.previous_actions.is_empty()
            && self.model_hint.is_none()
    }
}

/// Immutable input to one pipeline invocation.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Raw screenshot bytes (PNG, JPEG, or WebP).
    pub image_bytes: Vec<u8>,
    /// Natural-language description of the expected on-screen state.
    pub success_criterion: String,
    /// Optional hints from the calling agent.
    pub context: AnalysisContext,
}

impl AnalysisRequest {
    /// Create a request with an empty context.
    pub fn new(image_bytes: Vec<u8>, success_criterion: impl Into<String>) -> Self {
        Self {
            image_bytes,
            success_criterion: success_criterion.into(),
            context: AnalysisContext::default(),
        }
    }

    /// Attach caller context hints.
    #[must_use]
    pub fn with_context(mut self, context: AnalysisContext) -> Self {
        self.context = context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_context() {
        assert!(AnalysisContext::default().is_empty());

        let ctx = AnalysisContext {
            action: Some("clicked play".to_string()),
            ..Default::default()
        };
        assert!(!ctx.is_empty());
    }

    #[test]
    fn test_request_builder() {
        let request = AnalysisRequest::new(vec![1, 2, 3], "the video is playing").with_context(
            AnalysisContext {
                execution_history: vec!["opened browser".to_string()],
                ..Default::default()
            },
        );

        assert_eq!(request.image_bytes, vec![1, 2, 3]);
        assert_eq!(request.success_criterion, "the video is playing");
        assert_eq!(request.context.execution_history.len(), 1);
    }

    #[test]
    fn test_context_serde_defaults() {
        // Callers may send sparse context objects; missing fields default.
        let ctx: AnalysisContext = serde_json::from_str(r#"{"action":"typed url"}"#).unwrap();
        assert_eq!(ctx.action.as_deref(), Some("typed url"));
        assert!(ctx.execution_history.is_empty());
        assert!(ctx.model_hint.is_none());
    }
}
