//! Typed configuration covering every knob enumerated in spec §6, loaded
//! from TOML with sane defaults for a partial file (spec §4.9).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("failed to build layered config: {0}")]
    Layer(String),
}

impl From<ConfigError> for crate::error::CoreError {
    fn from(e: ConfigError) -> Self {
        crate::error::CoreError::Config(e.to_string())
    }
}

fn default_sync_interval_secs() -> u64 {
    15 * 60
}

fn default_queue_interval_secs() -> u64 {
    60
}

fn default_max_error_history() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub sync_interval_secs: u64,
    pub queue_interval_secs: u64,
    pub max_error_history: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: default_sync_interval_secs(),
            queue_interval_secs: default_queue_interval_secs(),
            max_error_history: default_max_error_history(),
        }
    }
}

impl SyncConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn queue_interval(&self) -> Duration {
        Duration::from_secs(self.queue_interval_secs)
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    #[serde(default = "default_region")]
    pub region: String,
    pub force_path_style: bool,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            bucket: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            region: default_region(),
            force_path_style: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    Openai,
    Claude,
    Ollama,
}

fn default_max_tokens() -> u32 {
    1000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiConfig {
    pub provider: AiProvider,
    pub api_endpoint: String,
    pub api_key: String,
    pub model_name: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl AiConfig {
    /// AI tier is only usable when provider, api key and model are all set
    /// (spec §4.8, item 1).
    pub fn is_usable(&self) -> bool {
        !self.api_key.is_empty() && !self.model_name.is_empty() && !self.api_endpoint.is_empty()
    }
}

fn default_num_keywords() -> usize {
    10
}

fn default_max_summary_length() -> usize {
    500
}

fn default_ai_timeout_seconds() -> u64 {
    60
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub num_keywords: usize,
    pub max_summary_length: usize,
    pub ai_timeout_seconds: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            num_keywords: default_num_keywords(),
            max_summary_length: default_max_summary_length(),
            ai_timeout_seconds: default_ai_timeout_seconds(),
        }
    }
}

impl AnalysisConfig {
    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_seconds)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportInterval {
    #[default]
    Manual,
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub interval: ExportInterval,
    pub retention_count: i64,
    pub include_media: bool,
    pub export_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ExportConfig {
    /// Clamp `retention_count < 0` to `0` and default an empty `export_dir`
    /// to `"exports"` (spec §6's normative bounds).
    fn normalize(&mut self) {
        if self.retention_count < 0 {
            self.retention_count = 0;
        }
        if self.export_dir.is_empty() {
            self.export_dir = "exports".to_string();
        }
    }
}

/// Root configuration object. A partial TOML file is valid — every section
/// has a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub object_store: ObjectStoreConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai: Option<AiConfig>,
    pub analysis: AnalysisConfig,
    pub export: ExportConfig,
}

impl Config {
    /// Read and parse a TOML file, applying §6's normative bounds.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.export.normalize();
        Ok(config)
    }

    /// `load`, falling back to `Config::default()` when the file is absent.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(&path) {
            Ok(config) => config,
            Err(ConfigError::Io { .. }) => Config::default(),
            Err(err) => {
                tracing::warn!(error = %err, "falling back to default config");
                Config::default()
            }
        }
    }

    /// Layer environment overrides (`PKB_OBJECT_STORE__ACCESS_KEY`, etc. —
    /// double underscore nests) on top of an optional TOML file. Intended
    /// for secrets that should not live in a checked-in config file.
    pub fn load_with_env_overrides(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path).required(false).format(config::FileFormat::Toml),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix("PKB")
                .separator("__")
                .try_parsing(true),
        );
        let raw = builder.build().map_err(|e| ConfigError::Layer(e.to_string()))?;
        let mut config: Config = raw
            .try_deserialize()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.export.normalize();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_spec_defaults() {
        let config = Config::default();
        assert_eq!(config.sync.sync_interval_secs, 900);
        assert_eq!(config.sync.queue_interval_secs, 60);
        assert_eq!(config.sync.max_error_history, 100);
        assert_eq!(config.object_store.region, "us-east-1");
        assert!(config.ai.is_none());
        assert_eq!(config.analysis.num_keywords, 10);
        assert_eq!(config.analysis.max_summary_length, 500);
        assert_eq!(config.analysis.ai_timeout_seconds, 60);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [object_store]
            endpoint = "https://s3.example.com"
            bucket = "my-bucket"
            access_key = "AKIA"
            secret_key = "secret"
            "#,
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.object_store.bucket, "my-bucket");
        assert_eq!(config.object_store.region, "us-east-1");
        assert_eq!(config.sync.sync_interval_secs, 900);
    }

    #[test]
    fn export_dir_and_retention_count_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [export]
            retention_count = -5
            export_dir = ""
            "#,
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.export.retention_count, 0);
        assert_eq!(config.export.export_dir, "exports");
    }

    #[test]
    fn load_or_default_falls_back_when_file_absent() {
        let config = Config::load_or_default("/nonexistent/path/config.toml");
        assert_eq!(config.sync.sync_interval_secs, 900);
    }

    #[test]
    fn ai_config_requires_all_three_fields_to_be_usable() {
        let ai = AiConfig {
            provider: AiProvider::Openai,
            api_endpoint: "https://api.openai.com".to_string(),
            api_key: String::new(),
            model_name: "gpt-4".to_string(),
            max_tokens: 1000,
        };
        assert!(!ai.is_usable());
    }
}
