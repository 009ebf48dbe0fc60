use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Alphabet used for short keys unless `KEY_CHARSET` overrides it.
pub const DEFAULT_KEY_CHARSET: &str =
    "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub storage: StorageConfig,
    pub keys: KeyConfig,
    /// Download rate in bytes per second. Zero or negative disables throttling.
    pub default_rate: i64,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    /// Directory holding the index database
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for stored objects
    pub root: String,
    /// Replace client file names with a random hex name on upload
    pub rename: bool,
}

#[derive(Debug, Clone)]
pub struct KeyConfig {
    pub charset: String,
    pub length: usize,
    /// Candidates drawn per key length before the length grows.
    pub max_attempts: u32,
    pub max_length: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            data_dir: "./data".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "./storage".to_string(),
            rename: false,
        }
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            charset: DEFAULT_KEY_CHARSET.to_string(),
            length: 6,
            max_attempts: 8,
            max_length: 10,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            storage: StorageConfig::default(),
            keys: KeyConfig::default(),
            default_rate: 256 * 1024,
            max_upload_size: 256 * 1024 * 1024,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or(defaults.node.bind_address);
        let data_dir = std::env::var("DATA_DIR").unwrap_or(defaults.node.data_dir);

        let root = std::env::var("STORAGE_ROOT").unwrap_or(defaults.storage.root);
        let rename = env_flag("RENAME_ON_UPLOAD").unwrap_or(defaults.storage.rename);

        let default_rate = env_parse("DEFAULT_RATE").unwrap_or(defaults.default_rate);
        let max_upload_size = env_parse("MAX_UPLOAD_SIZE").unwrap_or(defaults.max_upload_size);

        let charset = std::env::var("KEY_CHARSET").unwrap_or(defaults.keys.charset);
        let length = env_parse("KEY_LENGTH").unwrap_or(defaults.keys.length);
        let max_attempts = env_parse("KEY_MAX_ATTEMPTS").unwrap_or(defaults.keys.max_attempts);
        let max_length = env_parse("KEY_MAX_LENGTH").unwrap_or(length + 4);

        let config = Config {
            node: NodeConfig {
                bind_address,
                data_dir,
            },
            storage: StorageConfig { root, rename },
            keys: KeyConfig {
                charset,
                length,
                max_attempts,
                max_length,
            },
            default_rate,
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.root.is_empty() {
            return Err(ConfigError::ValidationError(
                "STORAGE_ROOT cannot be empty".to_string(),
            ));
        }

        // The storage root is walked by reindex, so the index must live elsewhere
        if absolute(&self.node.data_dir).starts_with(absolute(&self.storage.root)) {
            return Err(ConfigError::ValidationError(
                "DATA_DIR cannot be inside STORAGE_ROOT".to_string(),
            ));
        }

        let charset = &self.keys.charset;
        if charset.is_empty() {
            return Err(ConfigError::ValidationError(
                "KEY_CHARSET cannot be empty".to_string(),
            ));
        }
        if !charset.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::ValidationError(
                "KEY_CHARSET must only contain ASCII letters and digits".to_string(),
            ));
        }
        let mut seen = charset.chars().collect::<Vec<_>>();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != charset.len() {
            return Err(ConfigError::ValidationError(
                "KEY_CHARSET must not repeat characters".to_string(),
            ));
        }

        if self.keys.length == 0 {
            return Err(ConfigError::ValidationError(
                "KEY_LENGTH must be at least 1".to_string(),
            ));
        }
        if self.keys.max_length < self.keys.length {
            return Err(ConfigError::ValidationError(
                "KEY_MAX_LENGTH cannot be shorter than KEY_LENGTH".to_string(),
            ));
        }
        if self.keys.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "KEY_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.default_rate <= 0 {
            tracing::warn!("DEFAULT_RATE is {}; downloads are not throttled", self.default_rate);
        }

        Ok(())
    }
}

/// Absolute form of `path` with `.` and `..` resolved lexically.
fn absolute(path: &str) -> PathBuf {
    let path = Path::new(path);
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    };

    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    resolved
}
