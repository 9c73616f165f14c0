use std::time::Duration;

use pkb_core::config::AiConfig;
use reqwest::Client;
use serde_json::json;

use super::ProviderError;

pub async fn complete(
    config: &AiConfig,
    client: &Client,
    prompt: &str,
    timeout: Duration,
) -> Result<String, ProviderError> {
    let body = json!({
        "model": config.model_name,
        "messages": [{"role": "user", "content": prompt}],
        "max_tokens": config.max_tokens,
    });

    let response = client
        .post(&config.api_endpoint)
        .bearer_auth(&config.api_key)
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

    value["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            ProviderError::UnexpectedResponse("missing choices[0].message.content".to_string())
        })
}
