//! Environment-driven configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::reaper::DEFAULT_STUCK_TIMEOUT_MINUTES;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";
const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("Cannot determine a data directory; set LITSIEVE_DB_PATH")]
    NoDataDir,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_timeout_secs: u64,
    pub stuck_timeout_minutes: i64,
}

impl AppConfig {
    /// Load from `LITSIEVE_*` environment variables, with defaults for
    /// everything except the API key.
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_path = match std::env::var("LITSIEVE_DB_PATH") {
            Ok(path) => PathBuf::from(path),
            Err(_) => default_db_path()?,
        };

        let bind_addr = parse_env("LITSIEVE_BIND_ADDR", DEFAULT_BIND_ADDR.parse().ok())?;
        let llm_timeout_secs = parse_env("LITSIEVE_LLM_TIMEOUT_SECS", Some(DEFAULT_LLM_TIMEOUT_SECS))?;
        let stuck_timeout_minutes = parse_env(
            "LITSIEVE_STUCK_TIMEOUT_MINUTES",
            Some(DEFAULT_STUCK_TIMEOUT_MINUTES),
        )?;

        Ok(Self {
            db_path,
            bind_addr,
            llm_base_url: std::env::var("LITSIEVE_LLM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_LLM_BASE_URL.to_string()),
            llm_api_key: std::env::var("LITSIEVE_LLM_API_KEY").unwrap_or_default(),
            llm_timeout_secs,
            stuck_timeout_minutes,
        })
    }
}

fn default_db_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
    Ok(base.join("litsieve").join("screening.db"))
}

fn parse_env<T: std::str::FromStr>(
    key: &'static str,
    default: Option<T>,
) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => default.ok_or(ConfigError::Invalid {
            key,
            value: String::new(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; keep them to pure parsing.

    #[test]
    fn defaults_parse() {
        let addr: SocketAddr = DEFAULT_BIND_ADDR.parse().unwrap();
        assert_eq!(addr.port(), 8787);
    }

    #[test]
    fn parse_env_falls_back_to_default() {
        let value: u64 = parse_env("LITSIEVE_NONEXISTENT_KEY", Some(42)).unwrap();
        assert_eq!(value, 42);
    }
}
