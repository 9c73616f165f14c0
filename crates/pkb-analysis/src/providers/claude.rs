use std::time::Duration;

use pkb_core::config::AiConfig;
use reqwest::Client;
use serde_json::json;

use super::ProviderError;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub async fn complete(
    config: &AiConfig,
    client: &Client,
    prompt: &str,
    timeout: Duration,
) -> Result<String, ProviderError> {
    let body = json!({
        "model": config.model_name,
        "max_tokens": config.max_tokens,
        "messages": [{"role": "user", "content": prompt}],
    });

    let response = client
        .post(&config.api_endpoint)
        .header("x-api-key", &config.api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&body)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| ProviderError::Http(e.to_string()))?;

    if !response.status().is_success() {
        return Err(ProviderError::Status(response.status().as_u16()));
    }

    let value: serde_json::Value = response
        .json()
        .await
        .map_err(|e| ProviderError::Http(e.to_string()))?;

    value["content"][0]["text"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ProviderError::UnexpectedResponse("missing content[0].text".to_string()))
}
