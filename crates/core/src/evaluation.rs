//! Conversation Grading
//!
//! Asks the language model to grade a finished conversation and turns its
//! JSON answer into an [`Evaluation`]. A model that answers with broken or
//! incomplete JSON never fails the request: the caller gets a zero-score
//! evaluation explaining what went wrong instead.

use crate::{
    conversation::{ChatMessage, render_transcript},
    llm_client::{ChatRequest, LLMClient, LLMError},
    persona::PersonaSet,
    prompt::{EVALUATOR_SYSTEM_PROMPT, evaluation_prompt},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

/// Closing remark attached to every evaluation.
pub const CLOSING_COMMENT: &str = "お疲れ様でした！";

const DECODE_FAILURE_REVIEW: &str = "評価取得エラー";
const INVALID_RESULT_REVIEW: &str = "評価処理エラー";

/// A graded conversation, as returned to the trainee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: i64,
    pub review: String,
    pub feedback: String,
    pub comment: String,
}

impl Evaluation {
    /// Result used when the model's answer is not JSON at all.
    pub fn decode_failure(raw: &str) -> Self {
        Self {
            score: 0,
            review: DECODE_FAILURE_REVIEW.to_string(),
            feedback: format!("モデル応答の解析に失敗しました: {raw}"),
            comment: CLOSING_COMMENT.to_string(),
        }
    }

    /// Result used when the answer is JSON but does not describe a grade.
    pub fn invalid_result(err: &EvaluationError) -> Self {
        Self {
            score: 0,
            review: INVALID_RESULT_REVIEW.to_string(),
            feedback: format!("評価結果の処理中にエラーが発生しました: {err}"),
            comment: CLOSING_COMMENT.to_string(),
        }
    }
}

/// Why the model's answer could not be accepted as a grade.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("evaluation result is not a JSON object")]
    NotAnObject,
    #[error("evaluation result missing required field '{0}'")]
    MissingField(&'static str),
    #[error("field '{0}' must be a string")]
    InvalidField(&'static str),
    #[error("score must be an integer, got {0}")]
    ScoreNotInteger(String),
    #[error("score must be between 0 and 100, got {0}")]
    ScoreOutOfRange(i64),
}

/// Validates the model's JSON answer and attaches the closing comment.
pub fn parse_evaluation(content: &str) -> Result<Evaluation, EvaluationError> {
    let value: Value = serde_json::from_str(content)?;
    let obj = value.as_object().ok_or(EvaluationError::NotAnObject)?;

    for key in ["score", "review", "feedback"] {
        if !obj.contains_key(key) {
            return Err(EvaluationError::MissingField(key));
        }
    }

    let score = obj["score"]
        .as_i64()
        .ok_or_else(|| EvaluationError::ScoreNotInteger(obj["score"].to_string()))?;
    if !(0..=100).contains(&score) {
        return Err(EvaluationError::ScoreOutOfRange(score));
    }
    let review = obj["review"]
        .as_str()
        .ok_or(EvaluationError::InvalidField("review"))?;
    let feedback = obj["feedback"]
        .as_str()
        .ok_or(EvaluationError::InvalidField("feedback"))?;

    Ok(Evaluation {
        score,
        review: review.to_string(),
        feedback: feedback.to_string(),
        comment: CLOSING_COMMENT.to_string(),
    })
}

/// Rejections and failures of [`Evaluator::evaluate`].
#[derive(Debug, thiserror::Error)]
pub enum EvaluatorError {
    #[error("conversation history is empty")]
    EmptyHistory,
    #[error("unknown persona key {key:?}")]
    UnknownPersona { key: Option<String> },
    #[error(transparent)]
    Upstream(LLMError),
}

/// Grades conversations against the end-of-life care rubric.
pub struct Evaluator {
    client: Arc<dyn LLMClient>,
    personas: Arc<PersonaSet>,
    model: String,
    timeout: Duration,
}

impl Evaluator {
    pub fn new(
        client: Arc<dyn LLMClient>,
        personas: Arc<PersonaSet>,
        model: String,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            personas,
            model,
            timeout,
        }
    }

    /// Builds the grading request for `history` played against `persona`.
    pub fn build_request(&self, persona: &str, history: &[Value]) -> ChatRequest {
        let transcript = render_transcript(history);
        ChatRequest::new(
            self.model.clone(),
            vec![
                ChatMessage::system(EVALUATOR_SYSTEM_PROMPT),
                ChatMessage::user(evaluation_prompt(persona, &transcript)),
            ],
        )
        .json()
    }

    /// Grades a conversation.
    ///
    /// Input is validated before any upstream call. Transport failures are
    /// returned as errors; malformed answers become fallback evaluations.
    pub async fn evaluate(
        &self,
        history: &[Value],
        persona_key: Option<&str>,
    ) -> Result<Evaluation, EvaluatorError> {
        if history.is_empty() {
            return Err(EvaluatorError::EmptyHistory);
        }
        let persona = persona_key
            .and_then(|key| self.personas.get(key))
            .ok_or_else(|| EvaluatorError::UnknownPersona {
                key: persona_key.map(str::to_string),
            })?;

        info!(turns = history.len(), "Requesting evaluation");
        let request = self.build_request(persona, history);

        let content = match self.client.chat(request, self.timeout).await {
            Ok(content) => content,
            Err(LLMError::Format { body, .. }) => {
                warn!(raw = %body, "Evaluation response had no message content");
                return Ok(Evaluation::decode_failure(&body));
            }
            Err(e) => return Err(EvaluatorError::Upstream(e)),
        };

        match parse_evaluation(&content) {
            Ok(evaluation) => {
                info!(score = evaluation.score, "Parsed evaluation");
                Ok(evaluation)
            }
            Err(EvaluationError::Decode(e)) => {
                warn!(error = %e, raw = %content, "Evaluation is not valid JSON");
                Ok(Evaluation::decode_failure(&content))
            }
            Err(e) => {
                warn!(error = %e, raw = %content, "Evaluation failed validation");
                Ok(Evaluation::invalid_result(&e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::llm_client::{MockLLMClient, ResponseFormat};
    use serde_json::json;

    fn history() -> Vec<Value> {
        vec![
            json!({"role": "user", "content": "痛みはどうですか"}),
            json!({"role": "bot", "content": "少しましです"}),
        ]
    }

    fn evaluator(client: MockLLMClient) -> Evaluator {
        Evaluator::new(
            Arc::new(client),
            Arc::new(PersonaSet::builtin()),
            "gemma3:27b".to_string(),
            Duration::from_secs(90),
        )
    }

    fn replying(content: &'static str) -> MockLLMClient {
        let mut client = MockLLMClient::new();
        client
            .expect_chat()
            .times(1)
            .returning(move |_, _| Ok(content.to_string()));
        client
    }

    #[test]
    fn test_parse_valid_evaluation() {
        let eval = parse_evaluation(r#"{"score": 87, "review": "R", "feedback": "F"}"#).unwrap();
        assert_eq!(
            eval,
            Evaluation {
                score: 87,
                review: "R".into(),
                feedback: "F".into(),
                comment: CLOSING_COMMENT.into(),
            }
        );
    }

    #[test]
    fn test_parse_drops_extra_keys() {
        let eval =
            parse_evaluation(r#"{"score": 0, "review": "R", "feedback": "F", "extra": 1}"#).unwrap();
        assert_eq!(eval.score, 0);
        let value = serde_json::to_value(&eval).unwrap();
        assert!(value.get("extra").is_none());
    }

    #[test]
    fn test_parse_rejections() {
        assert!(matches!(
            parse_evaluation("not json"),
            Err(EvaluationError::Decode(_))
        ));
        assert!(matches!(
            parse_evaluation("[1, 2]"),
            Err(EvaluationError::NotAnObject)
        ));
        assert!(matches!(
            parse_evaluation(r#"{"score": 50, "review": "R"}"#),
            Err(EvaluationError::MissingField("feedback"))
        ));
        assert!(matches!(
            parse_evaluation(r#"{"score": 87.5, "review": "R", "feedback": "F"}"#),
            Err(EvaluationError::ScoreNotInteger(s)) if s == "87.5"
        ));
        assert!(matches!(
            parse_evaluation(r#"{"score": "87", "review": "R", "feedback": "F"}"#),
            Err(EvaluationError::ScoreNotInteger(_))
        ));
        assert!(matches!(
            parse_evaluation(r#"{"score": 120, "review": "R", "feedback": "F"}"#),
            Err(EvaluationError::ScoreOutOfRange(120))
        ));
        assert!(matches!(
            parse_evaluation(r#"{"score": 10, "review": 1, "feedback": "F"}"#),
            Err(EvaluationError::InvalidField("review"))
        ));
    }

    #[test]
    fn test_build_request_uses_json_format() {
        let evaluator = evaluator(MockLLMClient::new());
        let request = evaluator.build_request("PERSONA", &history());

        assert_eq!(request.model, "gemma3:27b");
        assert_eq!(request.format, Some(ResponseFormat::Json));
        assert!(!request.stream);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content, EVALUATOR_SYSTEM_PROMPT);
        assert_eq!(request.messages[1].role, Role::User);
        assert!(request.messages[1].content.contains("PERSONA"));
        assert!(
            request.messages[1]
                .content
                .contains("User: 痛みはどうですか\nAssistant: 少しましです\n")
        );
    }

    #[tokio::test]
    async fn test_evaluate_success() {
        let mut client = MockLLMClient::new();
        client
            .expect_chat()
            .withf(|req, timeout| {
                req.format == Some(ResponseFormat::Json) && *timeout == Duration::from_secs(90)
            })
            .times(1)
            .returning(|_, _| Ok(r#"{"score": 87, "review": "R", "feedback": "F"}"#.to_string()));

        let eval = evaluator(client)
            .evaluate(&history(), Some("A"))
            .await
            .unwrap();
        assert_eq!(eval.score, 87);
        assert_eq!(eval.review, "R");
        assert_eq!(eval.feedback, "F");
        assert_eq!(eval.comment, CLOSING_COMMENT);
    }

    #[tokio::test]
    async fn test_evaluate_rejects_without_upstream_call() {
        let evaluator = evaluator(MockLLMClient::new());

        assert!(matches!(
            evaluator.evaluate(&[], Some("A")).await,
            Err(EvaluatorError::EmptyHistory)
        ));
        assert!(matches!(
            evaluator.evaluate(&history(), None).await,
            Err(EvaluatorError::UnknownPersona { key: None })
        ));
        assert!(matches!(
            evaluator.evaluate(&history(), Some("Z")).await,
            Err(EvaluatorError::UnknownPersona { key: Some(k) }) if k == "Z"
        ));
    }

    #[tokio::test]
    async fn test_evaluate_non_json_falls_back() {
        let eval = evaluator(replying("I think the user did well."))
            .evaluate(&history(), Some("B"))
            .await
            .unwrap();
        assert_eq!(eval.score, 0);
        assert_eq!(eval.review, DECODE_FAILURE_REVIEW);
        assert!(eval.feedback.contains("I think the user did well."));
        assert_eq!(eval.comment, CLOSING_COMMENT);
    }

    #[tokio::test]
    async fn test_evaluate_invalid_payload_falls_back() {
        let eval = evaluator(replying(r#"{"score": "high", "review": "R", "feedback": "F"}"#))
            .evaluate(&history(), Some("C"))
            .await
            .unwrap();
        assert_eq!(eval.score, 0);
        assert_eq!(eval.review, INVALID_RESULT_REVIEW);
        assert!(eval.feedback.contains("score must be an integer"));
    }

    #[tokio::test]
    async fn test_evaluate_format_error_falls_back_with_body() {
        let mut client = MockLLMClient::new();
        client.expect_chat().times(1).returning(|_, _| {
            Err(LLMError::Format {
                endpoint: "http://ollama/api/chat".into(),
                body: "<html>gateway</html>".into(),
            })
        });

        let eval = evaluator(client)
            .evaluate(&history(), Some("A"))
            .await
            .unwrap();
        assert_eq!(eval.score, 0);
        assert!(eval.feedback.contains("<html>gateway</html>"));
    }

    #[tokio::test]
    async fn test_evaluate_status_error_is_returned() {
        let mut client = MockLLMClient::new();
        client.expect_chat().times(1).returning(|_, _| {
            Err(LLMError::Status {
                endpoint: "http://ollama/api/chat".into(),
                status: 503,
            })
        });

        let err = evaluator(client)
            .evaluate(&history(), Some("A"))
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluatorError::Upstream(LLMError::Status { status: 503, .. })));
        assert!(err.to_string().contains("http://ollama/api/chat"));
    }
}
