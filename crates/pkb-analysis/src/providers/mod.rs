//! Thin per-provider request/response shims for the AI analysis tier (spec
//! §4.8, tier 1). Each provider speaks a different wire shape; this module
//! hides that behind one `call_ai` entrypoint.

mod claude;
mod ollama;
mod openai;

use std::time::Duration;

use pkb_core::config::{AiConfig, AiProvider};
use reqwest::Client;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(String),

    #[error("provider returned status {0}")]
    Status(u16),

    #[error("unexpected response shape: {0}")]
    UnexpectedResponse(String),
}

/// Dispatches to the configured provider's wire format and returns the raw
/// completion text. Callers are expected to parse a JSON payload out of it
/// (see `orchestrator::parse_ai_payload`) — the three providers don't agree
/// on response shape, only this module's return type.
pub async fn call_ai(
    config: &AiConfig,
    client: &Client,
    prompt: &str,
    timeout: Duration,
) -> Result<String, ProviderError> {
    match config.provider {
        AiProvider::Openai => openai::complete(config, client, prompt, timeout).await,
        AiProvider::Claude => claude::complete(config, client, prompt, timeout).await,
        AiProvider::Ollama => ollama::complete(config, client, prompt, timeout).await,
    }
}
