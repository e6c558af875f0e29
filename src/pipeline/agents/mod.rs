pub mod types;
pub mod prompt;
pub mod output;
pub mod ollama;
pub mod openai;
pub mod executor;
#[cfg(test)]
pub(crate) mod mock;

pub use types::*;
pub use prompt::*;
pub use output::*;
pub use ollama::*;
pub use openai::*;
pub use executor::*;

use std::sync::Arc;

use thiserror::Error;

use crate::config::{LlmProvider, LlmSettings};
use crate::pipeline::extraction::ExtractionError;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM backend is not reachable at {0}")]
    Connection(String),

    #[error("LLM backend returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed LLM response: {0}")]
    ResponseParsing(String),
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Tool '{tool}' failed: {source}")]
    Tool {
        tool: String,
        #[source]
        source: ExtractionError,
    },

    #[error("Agent requested unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Agent produced an empty answer")]
    EmptyAnswer,

    #[error("Agent still requested a tool after {0} steps")]
    IterationLimit(usize),
}

/// Build the configured LLM backend.
pub fn build_llm_client(settings: &LlmSettings) -> Result<Arc<dyn LlmClient>, LlmError> {
    let client: Arc<dyn LlmClient> = match settings.provider {
        LlmProvider::Ollama => Arc::new(
            OllamaClient::new(&settings.ollama_url, settings.timeout_secs)?
                .with_sampling(settings.temperature, settings.max_tokens),
        ),
        LlmProvider::OpenAi => Arc::new(
            OpenAiClient::new(
                &settings.openai_base_url,
                settings.openai_api_key.clone().unwrap_or_default(),
                settings.timeout_secs,
            )?
            .with_sampling(settings.temperature, settings.max_tokens),
        ),
    };
    tracing::info!(
        provider = ?settings.provider,
        model = %settings.model,
        timeout_secs = settings.timeout_secs,
        "LLM client ready"
    );
    Ok(client)
}
