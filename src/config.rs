//! Configuration management

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Process configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token
    pub telegram_token: String,

    /// OpenAI API key for chat completions
    pub openai_api_key: String,

    /// Chat completion model
    pub openai_model: String,

    /// SQLite database path
    pub db_path: PathBuf,

    /// Status API port
    pub api_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let telegram_token =
            std::env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;

        let openai_api_key =
            std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?;

        let openai_model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let db_path = std::env::var("KENNER_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("kenner.db"));

        let api_port = std::env::var("API_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5000);

        Ok(Self {
            telegram_token,
            openai_api_key,
            openai_model,
            db_path,
            api_port,
        })
    }
}
