pub mod anthropic;
pub mod factory;
#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use serde::{ Deserialize, Serialize };
use crate::error::ChatError;
use crate::llm::ModelId;
use crate::models::chat::{ Conversation, Role };

/// Upper bound on the length of a generated reply.
pub const MAX_OUTPUT_TOKENS: u32 = 4000;

pub const SYSTEM_PROMPT: &str =
    "You are Claude, an AI assistant created by Anthropic. You're helpful, harmless, and honest.";

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RequestMessage {
    pub role: Role,
    pub content: String,
}

/// "Generate completion" request: the whole conversation plus the fixed
/// system instruction and output limit.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: ModelId,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<RequestMessage>,
}

impl CompletionRequest {
    pub fn new(
        model: ModelId,
        system: &str,
        max_tokens: u32,
        conversation: &Conversation
    ) -> Self {
        let messages = conversation
            .turns()
            .iter()
            .map(|turn| RequestMessage {
                role: turn.role(),
                content: turn.content().to_string(),
            })
            .collect();

        Self {
            model,
            max_tokens,
            system: system.to_string(),
            messages,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(
        &self,
        request: &CompletionRequest
    ) -> Result<CompletionResponse, ChatError>;

    fn get_base_url(&self) -> String;
}
