//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application:
//! the landing page, static assets, the JSON API and its OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ChatPayload, ChatResponse, ErrorResponse, RankingResponse, RankingRow,
        SaveRankingPayload, SaveRankingResponse, ScorePayload, ScoreResponse,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::chat_with_ollama,
        handlers::calculate_score,
        handlers::save_ranking,
        handlers::get_ranking,
    ),
    components(
        schemas(
            ChatPayload, ChatResponse, ScorePayload, ScoreResponse, SaveRankingPayload,
            SaveRankingResponse, RankingRow, RankingResponse, ErrorResponse
        )
    ),
    tags(
        (name = "Mitori API", description = "Simulated-patient conversations, grading and the leaderboard")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let landing_page = ServeFile::new(app_state.config.templates_path.join("index.html"));
    let static_files = ServeDir::new(&app_state.config.static_path);

    let api_router = Router::new()
        .route("/chat-with-ollama", post(handlers::chat_with_ollama))
        .route("/calculate-score", post(handlers::calculate_score))
        .route("/save-ranking", post(handlers::save_ranking))
        .route("/get-ranking", get(handlers::get_ranking))
        .with_state(app_state);

    Router::new()
        .route_service("/", landing_page)
        .nest_service("/static", static_files)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
