use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PROVIDER_ENDPOINT: &str = "https://openrouter.ai/api/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "openai/text-embedding-3-small";
const DEFAULT_SUMMARIZATION_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_EMBEDDING_CONCURRENCY: usize = 4;
const DEFAULT_SUMMARY_MAX_TOKENS: u32 = 300;
const DEFAULT_CHUNK_SIZE: usize = 500;
const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Connection settings for an external model provider.
///
/// Injected into the embedding and summarization clients at construction so neither
/// reads the process environment on the request path.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the OpenAI-compatible API (without the operation path).
    pub endpoint: String,
    /// Bearer token sent with every request.
    pub api_key: String,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Upper bound for a single provider call.
    pub timeout: Duration,
}

/// Runtime configuration for the campus search server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Embedding provider settings.
    pub embedding: ProviderConfig,
    /// Expected embedding dimensionality, when known.
    pub embedding_dimension: Option<usize>,
    /// Number of chunk embeddings requested concurrently during ingestion.
    pub embedding_concurrency: usize,
    /// Chat-completion provider settings used for summaries.
    pub summarization: ProviderConfig,
    /// Token cap applied to generated summaries.
    pub summary_max_tokens: u32,
    /// Number of words per chunk.
    pub chunk_size: usize,
    /// Directory receiving raw uploaded files.
    pub upload_dir: PathBuf,
    /// Optional JSON snapshot backing the document store.
    pub storage_path: Option<PathBuf>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let shared_key = load_env_optional("OPENAI_API_KEY");
        let embedding_key = load_env_optional("EMBEDDING_API_KEY")
            .or_else(|| shared_key.clone())
            .ok_or_else(|| ConfigError::MissingVariable("EMBEDDING_API_KEY".into()))?;
        let summarization_key = load_env_optional("SUMMARIZATION_API_KEY")
            .or(shared_key)
            .ok_or_else(|| ConfigError::MissingVariable("SUMMARIZATION_API_KEY".into()))?;

        Ok(Self {
            embedding: ProviderConfig {
                endpoint: load_env_or("EMBEDDING_ENDPOINT", DEFAULT_PROVIDER_ENDPOINT),
                api_key: embedding_key,
                model: load_env_or("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
                timeout: Duration::from_secs(parse_env_or(
                    "EMBEDDING_TIMEOUT_SECS",
                    DEFAULT_TIMEOUT_SECS,
                )?),
            },
            embedding_dimension: parse_env_optional("EMBEDDING_DIMENSION")?,
            embedding_concurrency: positive(
                "EMBEDDING_CONCURRENCY",
                parse_env_or("EMBEDDING_CONCURRENCY", DEFAULT_EMBEDDING_CONCURRENCY)?,
            )?,
            summarization: ProviderConfig {
                endpoint: load_env_or("SUMMARIZATION_ENDPOINT", DEFAULT_PROVIDER_ENDPOINT),
                api_key: summarization_key,
                model: load_env_or("SUMMARIZATION_MODEL", DEFAULT_SUMMARIZATION_MODEL),
                timeout: Duration::from_secs(parse_env_or(
                    "SUMMARIZATION_TIMEOUT_SECS",
                    DEFAULT_TIMEOUT_SECS,
                )?),
            },
            summary_max_tokens: parse_env_or("SUMMARY_MAX_TOKENS", DEFAULT_SUMMARY_MAX_TOKENS)?,
            chunk_size: positive(
                "CHUNK_SIZE",
                parse_env_or("CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
            )?,
            upload_dir: PathBuf::from(load_env_or("UPLOAD_DIR", DEFAULT_UPLOAD_DIR)),
            storage_path: load_env_optional("STORAGE_PATH").map(PathBuf::from),
            server_port: parse_env_optional("SERVER_PORT")?,
        })
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_env_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    Ok(parse_env_optional(key)?.unwrap_or(default))
}

fn positive(key: &str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        Err(ConfigError::InvalidValue(key.to_string()))
    } else {
        Ok(value)
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        embedding_endpoint = %config.embedding.endpoint,
        embedding_model = %config.embedding.model,
        summarization_model = %config.summarization.model,
        chunk_size = config.chunk_size,
        storage_path = ?config.storage_path,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_rejects_zero() {
        let error = positive("CHUNK_SIZE", 0).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue(key) if key == "CHUNK_SIZE"));
        assert_eq!(positive("CHUNK_SIZE", 3).unwrap(), 3);
    }

    #[test]
    fn parse_env_or_falls_back_when_unset() {
        let value: usize = parse_env_or("CAMPUS_SEARCH_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
