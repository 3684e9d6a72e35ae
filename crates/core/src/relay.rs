//! Patient Role-Play Relay
//!
//! Turns a browser chat turn into a chat-completion request that keeps the
//! model in character as the selected patient, and returns its reply.

use crate::{
    conversation::{ChatMessage, decode_history},
    llm_client::{ChatRequest, LLMClient, LLMError},
    persona::PersonaSet,
    prompt::roleplay_system_prompt,
};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tracing::info;

/// One chat turn as received from the client.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatTurn<'a> {
    pub message: Option<&'a str>,
    pub history: &'a [Value],
    pub model: Option<&'a str>,
    pub persona_key: Option<&'a str>,
}

/// Rejections and failures of [`ChatRelay::reply`].
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("message is missing or empty")]
    EmptyMessage,
    #[error("unknown persona key {key:?}")]
    UnknownPersona { key: Option<String> },
    /// The model answered, but not with a chat message.
    #[error("unexpected response format: {0}")]
    UnexpectedFormat(LLMError),
    #[error(transparent)]
    Upstream(LLMError),
}

/// Relays trainee messages to the model playing the patient.
pub struct ChatRelay {
    client: Arc<dyn LLMClient>,
    personas: Arc<PersonaSet>,
    default_model: String,
    timeout: Duration,
}

impl ChatRelay {
    pub fn new(
        client: Arc<dyn LLMClient>,
        personas: Arc<PersonaSet>,
        default_model: String,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            personas,
            default_model,
            timeout,
        }
    }

    /// The system message followed by the translated client history.
    pub fn build_messages(&self, persona: &str, history: &[Value]) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(roleplay_system_prompt(persona))];
        messages.extend(decode_history(history));
        messages
    }

    /// Validates `turn`, asks the model for the patient's reply and returns
    /// it trimmed. Nothing is sent upstream when validation fails.
    pub async fn reply(&self, turn: ChatTurn<'_>) -> Result<String, RelayError> {
        if turn.message.is_none_or(str::is_empty) {
            return Err(RelayError::EmptyMessage);
        }
        let persona = turn
            .persona_key
            .and_then(|key| self.personas.get(key))
            .ok_or_else(|| RelayError::UnknownPersona {
                key: turn.persona_key.map(str::to_string),
            })?;

        let model = turn.model.unwrap_or(&self.default_model);
        let request = ChatRequest::new(model, self.build_messages(persona, turn.history));

        let content = self
            .client
            .chat(request, self.timeout)
            .await
            .map_err(|e| match e {
                LLMError::Format { .. } => RelayError::UnexpectedFormat(e),
                other => RelayError::Upstream(other),
            })?;

        let reply = content.trim().to_string();
        info!(model = %model, reply = %reply, "Patient replied");
        Ok(reply)
    }
}
