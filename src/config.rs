use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::types::hash_token;
use crate::models::OwnerId;

/// Application-level constants
pub const APP_NAME: &str = "Lettera";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_VISION_MODEL: &str = "qwen2.5vl:7b";
const DEFAULT_CHAT_MODEL: &str = "llama3.1:8b";
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;
const DEFAULT_BIND: &str = "127.0.0.1:8787";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} is not a valid socket address: '{value}'")]
    InvalidAddress { key: &'static str, value: String },

    #[error("Invalid API token entry '{0}': expected token:owner")]
    InvalidToken(String),
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "lettera=info,lettera_lib=info,tower_http=info"
}

/// Get the application data directory
/// ~/Lettera/ on all platforms
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// One bearer token and the owner it authenticates. Only the SHA-256
/// digest of the token is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub token_hash: [u8; 32],
    pub owner: OwnerId,
}

impl TokenGrant {
    pub fn new(token: &str, owner: OwnerId) -> Self {
        Self {
            token_hash: hash_token(token),
            owner,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub blob_bucket: String,
    pub ollama_url: String,
    pub vision_model: String,
    pub chat_model: String,
    pub request_timeout_secs: u64,
    pub max_upload_bytes: u64,
    pub bind_addr: SocketAddr,
    pub api_tokens: Vec<TokenGrant>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: app_data_dir(),
            blob_bucket: "originals".to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            api_tokens: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Defaults overridden by `LETTERA_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        if let Some(dir) = get("LETTERA_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = get("LETTERA_OLLAMA_URL") {
            config.ollama_url = url;
        }
        if let Some(model) = get("LETTERA_VISION_MODEL") {
            config.vision_model = model;
        }
        if let Some(model) = get("LETTERA_CHAT_MODEL") {
            config.chat_model = model;
        }
        if let Some(raw) = get("LETTERA_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_positive("LETTERA_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = get("LETTERA_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = parse_positive("LETTERA_MAX_UPLOAD_BYTES", &raw)?;
        }
        let bind = get("LETTERA_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        config.bind_addr = bind.parse().map_err(|_| ConfigError::InvalidAddress {
            key: "LETTERA_BIND",
            value: bind.clone(),
        })?;
        if let Some(raw) = get("LETTERA_API_TOKENS") {
            config.api_tokens = parse_token_list(&raw)?;
        }
        Ok(config)
    }

    pub fn blob_root(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("lettera.db")
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        })
}

/// Parse `token:owner[,token:owner...]`.
pub fn parse_token_list(raw: &str) -> Result<Vec<TokenGrant>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (token, owner) = entry
                .split_once(':')
                .ok_or_else(|| ConfigError::InvalidToken(redact(entry)))?;
            let token = token.trim();
            if token.is_empty() {
                return Err(ConfigError::InvalidToken(redact(entry)));
            }
            let owner =
                OwnerId::parse(owner).map_err(|_| ConfigError::InvalidToken(redact(entry)))?;
            Ok(TokenGrant::new(token, owner))
        })
        .collect()
}

/// Never echo a secret back in an error.
fn redact(entry: &str) -> String {
    match entry.split_once(':') {
        Some((_, owner)) => format!("***:{owner}"),
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn app_data_dir_named_after_app() {
        assert!(app_data_dir().ends_with("Lettera"));
    }

    #[test]
    fn defaults_without_overrides() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.blob_bucket, "originals");
        assert_eq!(config.ollama_url, "http://localhost:11434");
        assert_eq!(config.request_timeout_secs, 300);
        assert_eq!(config.max_upload_bytes, 20 * 1024 * 1024);
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8787");
        assert!(config.api_tokens.is_empty());
    }

    #[test]
    fn env_overrides_apply() {
        let config = AppConfig::from_lookup(lookup(&[
            ("LETTERA_DATA_DIR", "/tmp/lettera"),
            ("LETTERA_CHAT_MODEL", "mistral"),
            ("LETTERA_TIMEOUT_SECS", "30"),
            ("LETTERA_BIND", "0.0.0.0:9000"),
            ("LETTERA_API_TOKENS", "secret1:alice, secret2:bob"),
        ]))
        .unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/lettera/lettera.db"));
        assert_eq!(config.blob_root(), PathBuf::from("/tmp/lettera/blobs"));
        assert_eq!(config.chat_model, "mistral");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.api_tokens.len(), 2);
        assert_eq!(config.api_tokens[1].owner.as_str(), "bob");
        assert_eq!(config.api_tokens[0].token_hash, hash_token("secret1"));
    }

    #[test]
    fn invalid_numbers_are_errors() {
        let err = AppConfig::from_lookup(lookup(&[("LETTERA_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { key: "LETTERA_TIMEOUT_SECS", .. }));
        assert!(AppConfig::from_lookup(lookup(&[("LETTERA_MAX_UPLOAD_BYTES", "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("LETTERA_BIND", "localhost")])).is_err());
    }

    #[test]
    fn malformed_tokens_are_redacted_errors() {
        let err = parse_token_list("topsecret").unwrap_err();
        assert_eq!(err, ConfigError::InvalidToken("***".into()));
        let err = parse_token_list("topsecret:../root").unwrap_err();
        assert!(!err.to_string().contains("topsecret"));
        assert!(parse_token_list(":alice").is_err());
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
