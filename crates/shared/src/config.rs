use std::path::PathBuf;

use thiserror::Error;

use crate::config_env::{optional_trimmed_env, parse_list_env, parse_u64_env};
use crate::credentials::{
    CredentialResolver, CredentialSourceKind, DEFAULT_CREDENTIAL_ENV_KEY, DEFAULT_SECRETS_FILE_PATH,
};
use crate::llm::GroqClientConfig;
use crate::reference::{DEFAULT_REFERENCE_DOCUMENT_PATH, ReferenceLoader};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_SESSION_IDLE_TTL_SECONDS: u64 = 30 * 60;
const DEFAULT_SESSION_PRUNE_INTERVAL_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub struct ChatServerConfig {
    pub bind_addr: String,
    pub session_idle_ttl_seconds: u64,
    pub session_prune_interval_seconds: u64,
    pub groq: GroqClientConfig,
    pub credentials: CredentialResolver,
    pub reference: ReferenceLoader,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid number in env var {0}")]
    ParseFloat(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("failed to load .env file: {0}")]
    Dotenv(String),
}

impl ChatServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: optional_trimmed_env("CHAT_SERVER_BIND_ADDR")
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            session_idle_ttl_seconds: parse_positive_u64_env(
                "CHAT_SESSION_IDLE_TTL_SECONDS",
                DEFAULT_SESSION_IDLE_TTL_SECONDS,
            )?,
            session_prune_interval_seconds: parse_positive_u64_env(
                "CHAT_SESSION_PRUNE_INTERVAL_SECONDS",
                DEFAULT_SESSION_PRUNE_INTERVAL_SECONDS,
            )?,
            groq: GroqClientConfig::from_env()?,
            credentials: credential_resolver_from_env()?,
            reference: ReferenceLoader::new(
                optional_trimmed_env("REFERENCE_DOCUMENT_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_REFERENCE_DOCUMENT_PATH)),
            ),
        })
    }
}

/// Loads `.env` from the working directory. A missing file is not an error.
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(ConfigError::Dotenv(err.to_string())),
    }
}

fn parse_positive_u64_env(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = parse_u64_env(key, default)?;
    if value == 0 {
        return Err(ConfigError::InvalidConfiguration(format!(
            "{key} must be greater than zero"
        )));
    }
    Ok(value)
}

fn credential_resolver_from_env() -> Result<CredentialResolver, ConfigError> {
    let secrets_path = optional_trimmed_env("SECRETS_FILE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRETS_FILE_PATH));

    let order = match parse_list_env("CREDENTIAL_SOURCES") {
        Some(names) => names
            .iter()
            .map(|name| {
                name.parse::<CredentialSourceKind>()
                    .map_err(|err| ConfigError::InvalidConfiguration(err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?,
        None => CredentialSourceKind::default_order().to_vec(),
    };

    if order.is_empty() {
        return Err(ConfigError::InvalidConfiguration(
            "CREDENTIAL_SOURCES must name at least one source".to_string(),
        ));
    }

    Ok(CredentialResolver::from_order(
        &order,
        DEFAULT_CREDENTIAL_ENV_KEY,
        secrets_path,
    ))
}
