//! Axum Handlers for the REST API
//!
//! Every failure is turned into a JSON body here. The chat and scoring
//! endpoints use error status codes; the ranking endpoints always answer 200
//! and report failures inside the body.

use axum::{
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use mitori_core::{
    evaluation::EvaluatorError,
    persona::PersonaSet,
    relay::{ChatTurn, RelayError},
};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    models::{
        ChatPayload, ChatResponse, ErrorResponse, RankingResponse, RankingRow,
        SaveRankingPayload, SaveRankingResponse, ScorePayload, ScoreResponse,
    },
    state::AppState,
};

const INVALID_REQUEST: &str = "無効なリクエストデータ";
const MISSING_MESSAGE: &str = "メッセージがありません";
const MISSING_HISTORY: &str = "会話履歴がありません";
const UNEXPECTED_FORMAT: &str = "Ollamaからの応答形式が予期せぬものです";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// A collaborator failed; the message is shown to the client.
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(error) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { error })).into_response()
            }
            ApiError::Upstream(error) => {
                error!("Upstream failure: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { error }),
                )
                    .into_response()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(reason = %rejection.body_text(), "Rejected request body");
        ApiError::BadRequest(INVALID_REQUEST.to_string())
    }
}

fn invalid_persona(personas: &PersonaSet) -> ApiError {
    ApiError::BadRequest(format!(
        "有効な前提プロンプトキー（{}）が必要です",
        personas.key_list()
    ))
}

/// Ask the simulated patient for its next reply.
#[utoipa::path(
    post,
    path = "/chat-with-ollama",
    request_body = ChatPayload,
    responses(
        (status = 200, description = "The patient's reply", body = ChatResponse),
        (status = 400, description = "Missing message or invalid persona key", body = ErrorResponse),
        (status = 500, description = "The language model could not be reached", body = ErrorResponse)
    )
)]
pub async fn chat_with_ollama(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(payload) = payload?;

    let turn = ChatTurn {
        message: payload.message.as_deref(),
        history: &payload.conversation_history,
        model: payload.model.as_deref(),
        persona_key: payload.precondition_key.as_deref(),
    };

    let reply = state.relay.reply(turn).await.map_err(|e| match e {
        RelayError::EmptyMessage => ApiError::BadRequest(MISSING_MESSAGE.to_string()),
        RelayError::UnknownPersona { .. } => invalid_persona(&state.personas),
        RelayError::UnexpectedFormat(e) => {
            error!(error = %e, "Unexpected chat response");
            ApiError::Upstream(UNEXPECTED_FORMAT.to_string())
        }
        RelayError::Upstream(e) => ApiError::Upstream(format!("Ollama API呼び出しエラー: {e}")),
    })?;

    if let Some(speech) = &state.speech {
        // Detached: the reply is returned without waiting for synthesis.
        speech.spawn(reply.clone());
    }

    Ok(Json(ChatResponse { response: reply }))
}

/// Grade a finished conversation.
#[utoipa::path(
    post,
    path = "/calculate-score",
    request_body = ScorePayload,
    responses(
        (status = 200, description = "The evaluation, or a zero-score fallback explaining a malformed model answer", body = ScoreResponse),
        (status = 400, description = "Empty history or invalid persona key", body = ErrorResponse),
        (status = 500, description = "The evaluation model could not be reached", body = ErrorResponse)
    )
)]
pub async fn calculate_score(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ScorePayload>, JsonRejection>,
) -> Result<Json<ScoreResponse>, ApiError> {
    let Json(payload) = payload?;

    let evaluation = state
        .evaluator
        .evaluate(
            &payload.conversation_history,
            payload.precondition_key.as_deref(),
        )
        .await
        .map_err(|e| match e {
            EvaluatorError::EmptyHistory => ApiError::BadRequest(MISSING_HISTORY.to_string()),
            EvaluatorError::UnknownPersona { .. } => invalid_persona(&state.personas),
            EvaluatorError::Upstream(e) => {
                ApiError::Upstream(format!("評価モデルへの接続エラー: {e}"))
            }
        })?;

    Ok(Json(evaluation.into()))
}

/// Add a score to the leaderboard.
#[utoipa::path(
    post,
    path = "/save-ranking",
    request_body = SaveRankingPayload,
    responses(
        (status = 200, description = "Whether the entry was stored", body = SaveRankingResponse)
    )
)]
pub async fn save_ranking(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SaveRankingPayload>, JsonRejection>,
) -> Json<SaveRankingResponse> {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            warn!(reason = %rejection.body_text(), "Rejected ranking body");
            return Json(SaveRankingResponse::failed(rejection.body_text()));
        }
    };

    match state.rankings.add_entry(payload.name, payload.score).await {
        Ok(_) => Json(SaveRankingResponse::saved()),
        Err(e) => {
            error!(error = %e, path = %state.rankings.path().display(), "Failed to save ranking");
            Json(SaveRankingResponse::failed(e.to_string()))
        }
    }
}

/// List the leaderboard, highest score first.
#[utoipa::path(
    get,
    path = "/get-ranking",
    responses(
        (status = 200, description = "The leaderboard; empty with an error message if it could not be read", body = RankingResponse)
    )
)]
pub async fn get_ranking(State(state): State<Arc<AppState>>) -> Json<RankingResponse> {
    match state.rankings.list_all().await {
        Ok(entries) => {
            info!(count = entries.len(), "Serving ranking");
            Json(RankingResponse {
                ranking: entries.into_iter().map(RankingRow::from).collect(),
                error: None,
            })
        }
        Err(e) => {
            error!(error = %e, path = %state.rankings.path().display(), "Failed to read ranking");
            Json(RankingResponse {
                ranking: Vec::new(),
                error: Some(e.to_string()),
            })
        }
    }
}
