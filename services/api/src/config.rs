use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub ollama_url: String,
    pub chat_model: String,
    pub evaluation_model: String,
    pub tts_url: String,
    pub speak_replies: bool,
    pub ranking_path: PathBuf,
    pub static_path: PathBuf,
    pub templates_path: PathBuf,
    pub personas_path: Option<PathBuf>,
    pub chat_timeout: Duration,
    pub evaluation_timeout: Duration,
    pub speech_timeout: Duration,
    pub log_level: Level,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = var_or(name, default);
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("'{}': {}", raw, e)))
}

fn timeout_var(name: &str, default_secs: u64) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_var(name, &default_secs.to_string())?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            "timeout must be at least 1 second".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address = parse_var::<SocketAddr>("BIND_ADDRESS", "0.0.0.0:5001")?;

        let ollama_url = var_or("OLLAMA_URL", "http://localhost:11434");
        if !ollama_url.starts_with("http://") && !ollama_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "OLLAMA_URL".to_string(),
                format!("'{}' is not an http(s) URL", ollama_url),
            ));
        }

        let chat_model = var_or("CHAT_MODEL", "gemma3:27b");
        let evaluation_model = var_or("EVALUATION_MODEL", &chat_model);
        if chat_model.is_empty() {
            return Err(ConfigError::InvalidValue(
                "CHAT_MODEL".to_string(),
                "model name must not be empty".to_string(),
            ));
        }

        let tts_url = var_or("TTS_URL", "http://192.168.0.221:9000/api/voice");
        let speak_replies = parse_var::<bool>("SPEAK_REPLIES", "false")?;

        let ranking_path = PathBuf::from(var_or("RANKING_PATH", "ranking.json"));
        let static_path = PathBuf::from(var_or("STATIC_PATH", "./static"));
        let templates_path = PathBuf::from(var_or("TEMPLATES_PATH", "./templates"));
        let personas_path = std::env::var("PERSONAS_PATH").ok().map(PathBuf::from);

        let chat_timeout = timeout_var("CHAT_TIMEOUT_SECS", 60)?;
        let evaluation_timeout = timeout_var("EVALUATION_TIMEOUT_SECS", 90)?;
        let speech_timeout = timeout_var("SPEECH_TIMEOUT_SECS", 20)?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            ollama_url,
            chat_model,
            evaluation_model,
            tts_url,
            speak_replies,
            ranking_path,
            static_path,
            templates_path,
            personas_path,
            chat_timeout,
            evaluation_timeout,
            speech_timeout,
            log_level,
        })
    }
}
