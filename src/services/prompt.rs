//! Prompt construction for verification requests.
//!
//! The system prompt demands pure JSON and explicitly forbids assuming
//! success; models that cannot comply still tend to emit labeled text that
//! the normalizer's later tiers can salvage.

use crate::domain::models::AnalysisContext;

/// System prompt sent with every verification request.
pub const SYSTEM_PROMPT: &str = "\
You are a strict visual verification assistant. You are shown a screenshot \
and a success criterion describing the expected on-screen state. Examine \
only what is actually visible in the screenshot. Never assume an action \
succeeded; absence of evidence means the criterion is NOT met.\n\
\n\
Respond with pure JSON and nothing else, in exactly this shape:\n\
{\n\
  \"verified\": boolean,\n\
  \"confidence\": integer 0-100,\n\
  \"reason\": \"short explanation grounded in visible evidence\",\n\
  \"visualEvidence\": {\n\
    \"observed\": \"what is visible on screen\",\n\
    \"matchesCriteria\": boolean,\n\
    \"details\": \"specific visual elements supporting the judgment\"\n\
  }\n\
}\n\
Do not wrap the JSON in markdown fences. Do not add commentary.";

/// Build the user prompt: the criterion plus any caller-supplied hints.
pub fn user_prompt(success_criterion: &str, context: &AnalysisContext) -> String {
    let mut prompt = format!(
        "Verify whether this screenshot satisfies the following success \
         criterion:\n\n{success_criterion}\n"
    );

    if let Some(ref action) = context.action {
        prompt.push_str(&format!("\nAction just performed: {action}\n"));
    }

    if !context.previous_actions.is_empty() {
        prompt.push_str("\nPrior actions:\n");
        for action in &context.previous_actions {
            prompt.push_str(&format!("- {action}\n"));
        }
    }

    if !context.execution_history.is_empty() {
        prompt.push_str("\nRecent execution history:\n");
        for line in &context.execution_history {
            prompt.push_str(&format!("- {line}\n"));
        }
    }

    prompt.push_str(
        "\nJudge strictly from the screenshot. Report what you actually see.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_prompt_contains_criterion() {
        let prompt = user_prompt("the video is playing", &AnalysisContext::default());
        assert!(prompt.contains("the video is playing"));
        assert!(!prompt.contains("Action just performed"));
    }

    #[test]
    fn test_context_hints_are_included() {
        let context = AnalysisContext {
            action: Some("clicked the play button".to_string()),
            execution_history: vec!["opened youtube.com".to_string()],
            previous_actions: vec!["typed search query".to_string()],
            model_hint: None,
        };
        let prompt = user_prompt("the video is playing", &context);
        assert!(prompt.contains("clicked the play button"));
        assert!(prompt.contains("opened youtube.com"));
        assert!(prompt.contains("typed search query"));
    }

    #[test]
    fn test_system_prompt_demands_json() {
        assert!(SYSTEM_PROMPT.contains("pure JSON"));
        assert!(SYSTEM_PROMPT.contains("visualEvidence"));
        assert!(SYSTEM_PROMPT.contains("Never assume"));
    }
}
