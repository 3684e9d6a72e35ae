use crate::conversation::ChatMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Output format hint understood by Ollama's chat endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Json,
}

/// A non-streaming chat-completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ResponseFormat>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            format: None,
        }
    }

    /// Asks the model for machine-parseable JSON output.
    pub fn json(mut self) -> Self {
        self.format = Some(ResponseFormat::Json);
        self
    }
}

/// Failures talking to the chat-completion endpoint.
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    /// Connection refused, DNS failure, timeout, or an unreadable body.
    #[error("request to {endpoint} failed: {}", error_chain(.source))]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },
    /// The endpoint answered 2xx but without `message.content`.
    #[error("unexpected response format from {endpoint}")]
    Format { endpoint: String, body: String },
}

/// Renders `err` followed by each distinct message in its source chain.
///
/// `reqwest::Error` only displays its outermost layer, which hides whether a
/// request was refused, unresolvable or timed out.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        let text = inner.to_string();
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        cause = inner.source();
    }
    rendered
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// A generic client for a chat-completion service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Sends `request` and returns the generated `message.content`, untrimmed.
    async fn chat(&self, request: ChatRequest, timeout: Duration) -> Result<String, LLMError>;
}

/// An `LLMClient` for Ollama's native `/api/chat` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    chat_url: String,
}

impl OllamaClient {
    /// Creates a client for the Ollama instance at `base_url`
    /// (e.g. `http://localhost:11434`).
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            chat_url: format!("{}/api/chat", base_url.trim_end_matches('/')),
        }
    }

    /// The chat URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.chat_url
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn chat(&self, request: ChatRequest, timeout: Duration) -> Result<String, LLMError> {
        let transport = |source| LLMError::Transport {
            endpoint: self.chat_url.clone(),
            source,
        };

        info!(url = %self.chat_url, model = %request.model, "Sending chat request");
        debug!(payload = ?request, "Chat payload");

        let response = self
            .http
            .post(&self.chat_url)
            .json(&request)
            .timeout(timeout)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        info!(status = status.as_u16(), "Received chat response");
        if !status.is_success() {
            return Err(LLMError::Status {
                endpoint: self.chat_url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(transport)?;
        match serde_json::from_str::<ChatResponse>(&body) {
            Ok(parsed) => Ok(parsed.message.content),
            Err(e) => {
                debug!(error = %e, body = %body, "Chat response missing message.content");
                Err(LLMError::Format {
                    endpoint: self.chat_url.clone(),
                    body,
                })
            }
        }
    }
}
