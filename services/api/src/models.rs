//! API Models
//!
//! Request and response bodies of the JSON endpoints. Field names follow the
//! browser client (`conversationHistory`, `preconditionKey`), and every type
//! derives `ToSchema` for the OpenAPI document.

use mitori_core::{evaluation::Evaluation, ranking::RankingEntry};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};
use utoipa::ToSchema;

/// Treats an explicit `null` history like an absent one.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    #[schema(example = "今日の具合はいかがですか？")]
    pub message: Option<String>,
    /// Prior turns as `{role, content}` objects; `bot` marks patient turns.
    #[serde(default, deserialize_with = "null_as_empty")]
    #[schema(value_type = Vec<Object>)]
    pub conversation_history: Vec<Value>,
    #[schema(example = "gemma3:27b")]
    pub model: Option<String>,
    #[schema(example = "A")]
    pub precondition_key: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScorePayload {
    #[serde(default, deserialize_with = "null_as_empty")]
    #[schema(value_type = Vec<Object>)]
    pub conversation_history: Vec<Value>,
    #[schema(example = "A")]
    pub precondition_key: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, PartialEq, Eq)]
pub struct ScoreResponse {
    #[schema(minimum = 0, maximum = 100, example = 80)]
    pub score: i64,
    pub review: String,
    pub feedback: String,
    pub comment: String,
}

impl From<Evaluation> for ScoreResponse {
    fn from(eval: Evaluation) -> Self {
        Self {
            score: eval.score,
            review: eval.review,
            feedback: eval.feedback,
            comment: eval.comment,
        }
    }
}

#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct SaveRankingPayload {
    #[schema(example = "山田")]
    pub name: Option<String>,
    #[schema(value_type = Option<f64>, example = 85)]
    pub score: Option<Number>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, PartialEq, Eq)]
pub struct SaveRankingResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveRankingResponse {
    pub fn saved() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct RankingRow {
    #[schema(example = "山田")]
    pub name: Option<String>,
    #[schema(value_type = f64, example = 85)]
    pub score: Value,
    #[schema(example = "2025-06-01T14:03:12.481+09:00")]
    pub timestamp: String,
}

impl From<RankingEntry> for RankingRow {
    fn from(entry: RankingEntry) -> Self {
        Self {
            name: entry.name,
            score: entry.score,
            timestamp: entry.timestamp,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, PartialEq)]
pub struct RankingResponse {
    pub ranking: Vec<RankingRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_payload_camel_case() {
        let payload: ChatPayload = serde_json::from_value(json!({
            "message": "hi",
            "conversationHistory": [{"role": "user", "content": "hi"}],
            "preconditionKey": "B"
        }))
        .unwrap();

        assert_eq!(payload.message.as_deref(), Some("hi"));
        assert_eq!(payload.conversation_history.len(), 1);
        assert_eq!(payload.model, None);
        assert_eq!(payload.precondition_key.as_deref(), Some("B"));
    }

    #[test]
    fn test_chat_payload_defaults() {
        let payload: ChatPayload = serde_json::from_value(json!({})).unwrap();
        assert!(payload.message.is_none());
        assert!(payload.conversation_history.is_empty());
    }

    #[test]
    fn test_null_history_is_empty() {
        let chat: ChatPayload = serde_json::from_value(json!({
            "message": "hi",
            "conversationHistory": null
        }))
        .unwrap();
        assert!(chat.conversation_history.is_empty());

        let score: ScorePayload = serde_json::from_value(json!({
            "conversationHistory": null,
            "preconditionKey": "A"
        }))
        .unwrap();
        assert!(score.conversation_history.is_empty());

        assert!(serde_json::from_value::<ChatPayload>(json!({"conversationHistory": "x"})).is_err());
    }

    #[test]
    fn test_save_ranking_payload_keeps_number_kind() {
        let payload: SaveRankingPayload =
            serde_json::from_value(json!({"name": "a", "score": 90})).unwrap();
        assert_eq!(payload.score.unwrap().to_string(), "90");

        let payload: SaveRankingPayload = serde_json::from_value(json!({"score": 72.5})).unwrap();
        assert!(payload.name.is_none());
        assert_eq!(payload.score.unwrap().to_string(), "72.5");
    }

    #[test]
    fn test_save_ranking_response_shape() {
        assert_eq!(
            serde_json::to_value(SaveRankingResponse::saved()).unwrap(),
            json!({"success": true})
        );
        assert_eq!(
            serde_json::to_value(SaveRankingResponse::failed("disk full")).unwrap(),
            json!({"success": false, "error": "disk full"})
        );
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            error: "メッセージがありません".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"error":"メッセージがありません"}"#);
    }

    #[test]
    fn test_score_response_from_evaluation() {
        let eval = Evaluation {
            score: 87,
            review: "R".into(),
            feedback: "F".into(),
            comment: "C".into(),
        };
        assert_eq!(
            serde_json::to_value(ScoreResponse::from(eval)).unwrap(),
            json!({"score": 87, "review": "R", "feedback": "F", "comment": "C"})
        );
    }
}
