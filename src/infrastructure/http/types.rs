//! Wire types for the OpenAI-compatible chat-completion API.

use serde::{Deserialize, Serialize};

use crate::domain::models::{OptimizedImage, ProviderConfig};

/// Chat-completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    /// Model identifier.
    pub model: String,
    /// System + user messages.
    pub messages: Vec<ChatMessage>,
    /// Completion token budget.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl ChatCompletionRequest {
    /// Build the standard verification request: optional system message,
    /// then one user message carrying the prompt text and the screenshot as
    /// a base64 data URL.
    pub fn for_verification(
        provider: &ProviderConfig,
        image: &OptimizedImage,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: MessageContent::Text(system.to_string()),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: prompt.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.to_data_url(),
                    },
                },
            ]),
        });

        Self {
            model: provider.model.clone(),
            messages,
            max_tokens: provider.max_tokens,
            temperature: provider.temperature,
        }
    }
}

/// One message in the conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// "system" or "user".
    pub role: String,
    /// Plain text or multimodal parts.
    pub content: MessageContent,
}

/// Message content: a bare string for system messages, an array of typed
/// parts for multimodal user messages.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content.
    Text(String),
    /// Multimodal content parts.
    Parts(Vec<ContentPart>),
}

/// A typed content part of a multimodal message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Prompt text.
    Text {
        /// The text itself.
        text: String,
    },
    /// Inline image reference.
    ImageUrl {
        /// The image payload wrapper.
        image_url: ImageUrl,
    },
}

/// Image payload wrapper; `url` is a `data:` URL.
#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    /// `data:image/jpeg;base64,...`
    pub url: String,
}

/// Chat-completion response body. Only the fields we read.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    /// Completion choices; the first one carries the reply.
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl ChatCompletionResponse {
    /// Extract the reply text of the first choice, if present.
    pub fn into_reply_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
    }
}

/// One completion choice.
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// The assistant message.
    pub message: ResponseMessage,
}

/// Assistant message in a completion choice.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    /// Raw reply text. Absent on some refusal/tool replies.
    #[serde(default)]
    pub content: Option<String>,
}

/// Response body of `GET /models`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelList {
    /// Available models.
    #[serde(default)]
    pub data: Vec<ModelEntry>,
}

/// One entry of the model listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    /// Model identifier.
    pub id: String,
}
