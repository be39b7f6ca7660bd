use std::env;

use uuid::Uuid;

use crate::auth::{Caller, Role};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}, expected compact/json")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub static_dir: String,
    pub auth_tokens: Vec<(String, Caller)>,
    pub seed_demo_drivers: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let auth_tokens = match env::var("AUTH_TOKENS") {
            Ok(raw) => parse_auth_tokens(&raw)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: parse_or_default("LOG_FORMAT", LogFormat::Compact)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
            auth_tokens,
            seed_demo_drivers: parse_or_default("SEED_DEMO_DRIVERS", false)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

/// Parses `token:role:uuid` entries separated by commas.
pub fn parse_auth_tokens(raw: &str) -> Result<Vec<(String, Caller)>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(3, ':');
            let (Some(token), Some(role), Some(id)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(AppError::Internal(format!(
                    "invalid AUTH_TOKENS entry: {entry}, expected token:role:uuid"
                )));
            };

            let role = role
                .parse::<Role>()
                .map_err(|err| AppError::Internal(format!("invalid AUTH_TOKENS: {err}")))?;
            let id = Uuid::parse_str(id)
                .map_err(|err| AppError::Internal(format!("invalid AUTH_TOKENS: {err}")))?;

            Ok((token.to_string(), Caller { id, role }))
        })
        .collect()
}
