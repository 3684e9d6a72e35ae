//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources: the relay and evaluator services, the leaderboard
//! store and the immutable configuration.

use crate::config::Config;
use anyhow::Context;
use mitori_core::{
    evaluation::Evaluator,
    llm_client::{LLMClient, OllamaClient},
    persona::PersonaSet,
    ranking::RankingStore,
    relay::ChatRelay,
    speech::SpeechForwarder,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<ChatRelay>,
    pub evaluator: Arc<Evaluator>,
    pub rankings: Arc<RankingStore>,
    /// Present only when replies should also be spoken.
    pub speech: Option<Arc<SpeechForwarder>>,
    pub personas: Arc<PersonaSet>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires the services described by `config` around an Ollama client.
    pub fn from_config(config: Config, personas: PersonaSet) -> anyhow::Result<Self> {
        let llm_client: Arc<dyn LLMClient> = Arc::new(OllamaClient::new(&config.ollama_url));
        Self::with_client(config, personas, llm_client)
    }

    /// Like [`AppState::from_config`], with an explicit chat-completion client.
    pub fn with_client(
        config: Config,
        personas: PersonaSet,
        llm_client: Arc<dyn LLMClient>,
    ) -> anyhow::Result<Self> {
        let personas = Arc::new(personas);

        let relay = ChatRelay::new(
            llm_client.clone(),
            personas.clone(),
            config.chat_model.clone(),
            config.chat_timeout,
        );
        let evaluator = Evaluator::new(
            llm_client,
            personas.clone(),
            config.evaluation_model.clone(),
            config.evaluation_timeout,
        );

        let speech = if config.speak_replies {
            let forwarder = SpeechForwarder::parse(&config.tts_url, config.speech_timeout)
                .with_context(|| format!("Invalid TTS_URL '{}'", config.tts_url))?;
            Some(Arc::new(forwarder))
        } else {
            None
        };

        Ok(Self {
            relay: Arc::new(relay),
            evaluator: Arc::new(evaluator),
            rankings: Arc::new(RankingStore::new(config.ranking_path.clone())),
            speech,
            personas,
            config: Arc::new(config),
        })
    }
}
