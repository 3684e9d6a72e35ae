//! Main Entrypoint for the Mitori API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the patient personas.
//! 3. Initializing shared services (the Ollama client, grading, TTS, leaderboard).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use mitori_api::{config::Config, router::create_router, state::AppState};
use mitori_core::persona::PersonaSet;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Load Personas ---
    let personas = match &config.personas_path {
        Some(path) => PersonaSet::from_dir(path)
            .with_context(|| format!("Failed to load personas from {}", path.display()))?,
        None => PersonaSet::builtin(),
    };
    info!(keys = %personas.key_list(), "Personas loaded.");

    // --- 4. Initialize Shared Services ---
    let app_state = Arc::new(AppState::from_config(config.clone(), personas)?);
    if let Some(speech) = &app_state.speech {
        info!(tts_url = %speech.url(), "Replies will be forwarded to TTS.");
    }

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        ollama_url = %config.ollama_url,
        chat_model = %config.chat_model,
        evaluation_model = %config.evaluation_model,
        ranking_path = %config.ranking_path.display(),
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
