//! Conversation Messages
//!
//! Types for the role-tagged messages sent to the chat-completion endpoint,
//! and the validated decode of the loosely-shaped history the browser sends.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Role of a message in a chat-completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message forwarded upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Why a client history entry was not forwarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TurnError {
    #[error("history entry is not an object")]
    NotAnObject,
    #[error("history entry has no string 'role'")]
    MissingRole,
    #[error("history entry has no string 'content'")]
    MissingContent,
    #[error("history entry role '{0}' is not forwarded")]
    UnsupportedRole(String),
}

/// Decodes one client history entry into an upstream message.
///
/// The browser labels model turns `bot`; those become `assistant`. Only
/// `user` and `assistant` turns are accepted, so a client cannot inject
/// extra system prompts.
pub fn decode_turn(value: &Value) -> Result<ChatMessage, TurnError> {
    let obj = value.as_object().ok_or(TurnError::NotAnObject)?;
    let role = obj
        .get("role")
        .and_then(Value::as_str)
        .ok_or(TurnError::MissingRole)?;
    let content = obj
        .get("content")
        .and_then(Value::as_str)
        .ok_or(TurnError::MissingContent)?;

    match role {
        "user" => Ok(ChatMessage::user(content)),
        "assistant" | "bot" => Ok(ChatMessage::assistant(content)),
        other => Err(TurnError::UnsupportedRole(other.to_string())),
    }
}

/// Decodes a whole history, dropping (and logging) entries that fail.
pub fn decode_history(history: &[Value]) -> Vec<ChatMessage> {
    history
        .iter()
        .filter_map(|entry| match decode_turn(entry) {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::warn!(error = %e, entry = %entry, "Skipping history entry");
                None
            }
        })
        .collect()
}

/// Renders a history as `Role: content` lines for the evaluation prompt.
///
/// Unlike [`decode_history`] nothing is dropped here: the grader sees every
/// turn the trainee saw.
pub fn render_transcript(history: &[Value]) -> String {
    let mut out = String::new();
    for entry in history {
        let role = entry
            .get("role")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .replace("bot", "Assistant");
        let content = match entry.get("content") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        out.push_str(&capitalize(&role));
        out.push_str(": ");
        out.push_str(&content);
        out.push('\n');
    }
    out
}

/// First character upper-cased, the rest lower-cased.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
