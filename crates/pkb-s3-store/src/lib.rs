//! S3-compatible `ObjectStore`, signed with AWS Signature V4 (spec §4.2).
//!
//! Kept in its own crate so the SigV4/HTTP dependency set (reqwest, hmac,
//! sha2) doesn't leak into `pkb-core`, which only needs the `ObjectStore`
//! trait itself.

mod addressing;
mod sigv4;

use std::time::Duration;

use async_trait::async_trait;
use pkb_core::store::{ObjectStore, ObjectStoreError, StoreResult};
use reqwest::{Client, StatusCode};
use thiserror::Error;

pub use addressing::AddressingStyle;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum S3StoreError {
    #[error("failed to build request: {0}")]
    Build(String),

    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct S3StoreConfig {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub addressing: AddressingStyle,
}

/// S3-compatible object store signing every request with SigV4.
pub struct S3ObjectStore {
    config: S3StoreConfig,
    client: Client,
}

impl S3ObjectStore {
    pub fn new(config: S3StoreConfig) -> Result<Self, S3StoreError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(S3StoreError::Transport)?;
        Ok(Self { config, client })
    }

    fn url_for(&self, key: &str) -> String {
        addressing::build_url(
            self.config.addressing,
            &self.config.endpoint,
            &self.config.bucket,
            key,
        )
    }

    /// Signs a request for `key`, with optional query parameters. The query
    /// string is built once via `sigv4::canonical_query_string` and used
    /// both in the signature and on the actual request URL, so the bytes
    /// signed always match the bytes sent.
    async fn signed_request(
        &self,
        method: reqwest::Method,
        key: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::RequestBuilder, S3StoreError> {
        let url = self.url_for(key);
        let parsed = url::Url::parse(&url).map_err(|e| S3StoreError::Build(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| S3StoreError::Build("url has no host".to_string()))?
            .to_string();

        let canonical_query_string = sigv4::canonical_query_string(query);
        let full_url = if canonical_query_string.is_empty() {
            url
        } else {
            format!("{url}?{canonical_query_string}")
        };

        let signing = sigv4::SigningParams {
            method: method.as_str(),
            host: &host,
            canonical_uri: parsed.path(),
            canonical_query_string: &canonical_query_string,
            region: &self.config.region,
            access_key: &self.config.access_key,
            secret_key: &self.config.secret_key,
        };
        let signed = sigv4::sign(&signing);

        let mut builder = self
            .client
            .request(method, &full_url)
            .header("host", host)
            .header("x-amz-date", signed.amz_date.clone())
            .header("x-amz-content-sha256", sigv4::UNSIGNED_PAYLOAD)
            .header("authorization", signed.authorization_header);
        if !self.config.bucket.is_empty() {
            builder = builder.header("x-amz-bucket", self.config.bucket.clone());
        }
        Ok(builder)
    }

    /// Maps an HTTP response onto the spec §4.2 status table. Body matching
    /// is case-sensitive.
    async fn map_error(status: StatusCode, body: String) -> ObjectStoreError {
        let error = match status.as_u16() {
            401 => ObjectStoreError::AuthFailed(body),
            403 if body.contains("SignatureDoesNotMatch")
                || body.contains("InvalidAccessKeyId")
                || body.contains("AccessDenied") =>
            {
                ObjectStoreError::AuthFailed(body)
            }
            403 => ObjectStoreError::Failed(body),
            503 if body.contains("SlowDown") || body.contains("Quota exceeded") => {
                ObjectStoreError::QuotaExceeded(body)
            }
            _ => ObjectStoreError::Failed(format!("status {status}: {body}")),
        };
        tracing::warn!(%status, error = %error, "s3 request failed");
        error
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> StoreResult<()> {
        tracing::debug!(key, bytes = bytes.len(), "s3 put");
        let request = self
            .signed_request(reqwest::Method::PUT, key, &[])
            .await
            .map_err(|e| ObjectStoreError::Failed(e.to_string()))?;
        let response = request
            .body(bytes)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Failed(e.to_string()))?;
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Self::map_error(status, body).await)
    }

    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        tracing::debug!(key, "s3 get");
        let request = self
            .signed_request(reqwest::Method::GET, key, &[])
            .await
            .map_err(|e| ObjectStoreError::Failed(e.to_string()))?;
        let response = request
            .send()
            .await
            .map_err(|e| ObjectStoreError::Failed(e.to_string()))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_error(status, body).await);
        }
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| ObjectStoreError::Failed(e.to_string()))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        tracing::debug!(key, "s3 delete");
        let request = self
            .signed_request(reqwest::Method::DELETE, key, &[])
            .await
            .map_err(|e| ObjectStoreError::Failed(e.to_string()))?;
        let response = request
            .send()
            .await
            .map_err(|e| ObjectStoreError::Failed(e.to_string()))?;
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Self::map_error(status, body).await)
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        tracing::debug!(prefix, "s3 list");
        let request = self
            .signed_request(
                reqwest::Method::GET,
                "",
                &[("list-type", "2"), ("prefix", prefix)],
            )
            .await
            .map_err(|e| ObjectStoreError::Failed(e.to_string()))?;
        let response = request
            .send()
            .await
            .map_err(|e| ObjectStoreError::Failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_error(status, body).await);
        }
        let body = response
            .text()
            .await
            .map_err(|e| ObjectStoreError::Failed(e.to_string()))?;
        Ok(parse_list_bucket_result(&body))
    }
}

/// Pulls `<Key>...</Key>` entries out of an S3 `ListObjectsV2` XML response.
/// Deliberately not a full XML parser — the response shape is fixed and
/// narrow enough that a scan is simpler and good enough.
fn parse_list_bucket_result(body: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut rest = body;
    while let Some(start) = rest.find("<Key>") {
        let after_start = &rest[start + "<Key>".len()..];
        let Some(end) = after_start.find("</Key>") else {
            break;
        };
        keys.push(after_start[..end].to_string());
        rest = &after_start[end + "</Key>".len()..];
    }
    keys
}
