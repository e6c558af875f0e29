use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Financial Document Analyzer";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Query used when the client sends none (or only whitespace).
pub const DEFAULT_QUERY: &str = "Summarize this financial document and highlight key points.";

/// Name of the in-process queue that carries background analysis jobs.
pub const ANALYSIS_QUEUE: &str = "analysis";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "findoc=info,findoc_lib=info,tower_http=info"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Unknown LLM provider '{0}' (expected 'openai' or 'ollama')")]
    UnknownProvider(String),

    #[error("OPENAI_API_KEY must be set for the openai provider")]
    MissingApiKey,
}

/// Which LLM backend executes the agent stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

/// Global LLM invocation settings, configured once per process.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub ollama_url: String,
    pub openai_base_url: String,
    pub openai_api_key: Option<String>,
}

impl LlmSettings {
    /// Split a `provider/model` string. A bare model name means OpenAI.
    pub fn parse_model(value: &str) -> Result<(LlmProvider, String), ConfigError> {
        match value.split_once('/') {
            Some((provider, model)) => {
                let provider = match provider.to_ascii_lowercase().as_str() {
                    "openai" => LlmProvider::OpenAi,
                    "ollama" => LlmProvider::Ollama,
                    other => return Err(ConfigError::UnknownProvider(other.to_string())),
                };
                Ok((provider, model.to_string()))
            }
            None => Ok((LlmProvider::OpenAi, value.to_string())),
        }
    }
}

/// Process configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Directory where uploads are staged while a pipeline runs.
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub llm: LlmSettings,
    pub workers: usize,
    pub queue_capacity: usize,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    /// Load from process environment (after `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Kept separate from `from_env`
    /// so tests never touch the real process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let model_spec = get("FINDOC_MODEL")
            .or_else(|| get("OPENAI_MODEL"))
            .unwrap_or_else(|| "openai/gpt-4o-mini".to_string());
        let (provider, model) = LlmSettings::parse_model(&model_spec)?;

        let openai_api_key = get("OPENAI_API_KEY");
        if provider == LlmProvider::OpenAi && openai_api_key.is_none() {
            return Err(ConfigError::MissingApiKey);
        }

        let llm = LlmSettings {
            provider,
            model,
            temperature: parse_or("FINDOC_TEMPERATURE", get("FINDOC_TEMPERATURE"), 0.2)?,
            max_tokens: parse_or("FINDOC_MAX_TOKENS", get("FINDOC_MAX_TOKENS"), 1500)?,
            timeout_secs: parse_or("FINDOC_LLM_TIMEOUT_SECS", get("FINDOC_LLM_TIMEOUT_SECS"), 120)?,
            ollama_url: get("OLLAMA_URL").unwrap_or_else(|| "http://localhost:11434".into()),
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".into()),
            openai_api_key,
        };

        let max_upload_mb: usize = parse_or("FINDOC_MAX_UPLOAD_MB", get("FINDOC_MAX_UPLOAD_MB"), 25)?;
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "FINDOC_MAX_UPLOAD_MB",
                value: max_upload_mb.to_string(),
            })?;
        let workers: usize = parse_or("FINDOC_WORKERS", get("FINDOC_WORKERS"), 2)?;
        let queue_capacity: usize =
            parse_or("FINDOC_QUEUE_CAPACITY", get("FINDOC_QUEUE_CAPACITY"), 64)?;

        Ok(Self {
            bind_addr: parse_or(
                "FINDOC_BIND",
                get("FINDOC_BIND"),
                SocketAddr::from(([0, 0, 0, 0], 8000)),
            )?,
            data_dir: get("FINDOC_DATA_DIR").map(PathBuf::from).unwrap_or_else(|| "data".into()),
            db_path: get("FINDOC_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| "analysis.db".into()),
            llm,
            workers: workers.max(1),
            queue_capacity: queue_capacity.max(1),
            max_upload_bytes,
        })
    }
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}
