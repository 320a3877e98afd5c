//! Application Configuration Module
//!
//! This module centralizes the configuration for the interview service.
//! It loads settings from environment variables and provides a single,
//! shareable struct that can be passed throughout the application.

use secrecy::SecretString;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_GEMINI_MODEL: &str = gemini_client::client::DEFAULT_MODEL;
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    OpenAI,
}

impl LlmProvider {
    fn key_var(self) -> &'static str {
        match self {
            LlmProvider::Gemini => "GEMINI_API_KEY",
            LlmProvider::OpenAI => "OPENAI_API_KEY",
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            LlmProvider::Gemini => DEFAULT_GEMINI_MODEL,
            LlmProvider::OpenAI => DEFAULT_OPENAI_MODEL,
        }
    }
}

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: LlmProvider,
    /// Key for whichever provider is selected.
    pub api_key: SecretString,
    pub chat_model: String,
    pub question_count: usize,
    pub provider_timeout: Duration,
    pub speech_timeout: Duration,
    pub prompts_dir: Option<PathBuf>,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// *   `LLM_PROVIDER`: "gemini" or "openai". Defaults to "gemini".
    /// *   `GEMINI_API_KEY` / `OPENAI_API_KEY`: Required for the selected provider.
    /// *   `CHAT_MODEL`: (Optional) Defaults to the provider's default model.
    /// *   `QUESTION_COUNT`: (Optional) Questions per interview. Defaults to 10.
    /// *   `PROVIDER_TIMEOUT_SECS`: (Optional) Defaults to 60.
    /// *   `SPEECH_TIMEOUT_SECS`: (Optional) Defaults to 120.
    /// *   `PROMPTS_DIR`: (Optional) Directory of `*.md` prompt overrides.
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let provider_str = lookup("LLM_PROVIDER").unwrap_or_else(|| "gemini".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "gemini" => LlmProvider::Gemini,
            "openai" => LlmProvider::OpenAI,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LLM_PROVIDER".to_string(),
                    format!("'{}' is not one of 'gemini' or 'openai'", other),
                ));
            }
        };

        let api_key = lookup(provider.key_var())
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from)
            .ok_or_else(|| {
                ConfigError::MissingVar(format!(
                    "{} must be set for the selected provider",
                    provider.key_var()
                ))
            })?;

        let chat_model = lookup("CHAT_MODEL").unwrap_or_else(|| provider.default_model().to_string());

        let question_count: usize = parse_var(&lookup, "QUESTION_COUNT", 10)?;
        if question_count == 0 {
            return Err(ConfigError::InvalidValue(
                "QUESTION_COUNT".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let provider_timeout = Duration::from_secs(parse_var(&lookup, "PROVIDER_TIMEOUT_SECS", 60)?);
        let speech_timeout = Duration::from_secs(parse_var(&lookup, "SPEECH_TIMEOUT_SECS", 120)?);
        let prompts_dir = lookup("PROMPTS_DIR").map(PathBuf::from);

        // Configure logging level from RUST_LOG, with a sensible default.
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            provider,
            api_key,
            chat_model,
            question_count,
            provider_timeout,
            speech_timeout,
            prompts_dir,
            log_level,
        })
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
