use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::patterns::TimestampFormat;
use crate::pipeline::sections::ExclusionRules;

/// Application-level constants
pub const APP_NAME: &str = "Clinorm";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable pointing at a JSON normalization config.
pub const CONFIG_ENV: &str = "CLINORM_CONFIG";

/// Environment variable pointing at a JSON dispatch config.
pub const DISPATCH_CONFIG_ENV: &str = "CLINORM_DISPATCH_CONFIG";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info"
}

/// Per-user application directory (`~/.clinorm`), if a home directory exists.
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".clinorm"))
}

/// Default prompt-template directory (`~/.clinorm/prompts`).
pub fn default_prompt_dir() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join("prompts"))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for the normalization core and its ingestion step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Section titles suppressed per document kind.
    pub exclusions: ExclusionRules,
    /// Timestamp layout that bounds daily progress notes.
    pub course_format: TimestampFormat,
    /// Replacement for redacted names/dates. `None` deletes them outright.
    pub redaction_token: Option<String>,
    /// Candidate text encodings, tried in order (WHATWG labels).
    pub encodings: Vec<String>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            exclusions: ExclusionRules::default(),
            course_format: TimestampFormat::Hyphenated,
            redaction_token: None,
            encodings: vec!["utf-8".into(), "gbk".into(), "gb18030".into()],
        }
    }
}

impl NormalizeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.encodings.is_empty() {
            return Err(ConfigError::Invalid("encodings must not be empty".into()));
        }
        for label in &self.encodings {
            if encoding_rs::Encoding::for_label(label.as_bytes()).is_none() {
                return Err(ConfigError::Invalid(format!("unknown encoding label: {label}")));
            }
        }
        if let Some(token) = &self.redaction_token {
            if token.chars().any(crate::pipeline::patterns::is_han) {
                return Err(ConfigError::Invalid(
                    "redaction_token must not contain Han characters".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Settings for the LLM batch dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// OpenAI-compatible API root, e.g. `https://api.deepseek.com/v1`.
    pub base_url: String,
    pub model: String,
    /// One key per dispatcher instance; the instance index selects its key.
    pub api_keys: Vec<String>,
    pub max_attempts: u32,
    pub base_retry_delay_ms: u64,
    /// Pause after each successful request.
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com/v1".into(),
            model: "deepseek-chat".into(),
            api_keys: Vec::new(),
            max_attempts: 5,
            base_retry_delay_ms: 1_000,
            request_delay_ms: 500,
            timeout_secs: 120,
            max_tokens: 4096,
            temperature: 0.1,
        }
    }
}

/// Load a JSON config from `path`, else from the file named by `env_var`,
/// else fall back to defaults.
pub fn load_json<T>(path: Option<&Path>, env_var: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Default,
{
    let resolved = match path {
        Some(p) => Some(p.to_path_buf()),
        None => std::env::var_os(env_var).map(PathBuf::from),
    };

    let Some(path) = resolved else {
        return Ok(T::default());
    };

    let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })
}
