//! Environment-driven client configuration.
//!
//! A `.env` file in the working directory is honoured for local development.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use storefront_cart::{CartLedger, FileCartStore};

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
    #[error("Could not resolve a data directory: {0}")]
    DataDir(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend base URL, without a trailing slash.
    pub api_url: String,
    pub timeout: Duration,
    /// Directory holding the persisted cart.
    pub data_dir: PathBuf,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("STOREFRONT_API_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(
                "STOREFRONT_API_URL".to_string(),
                format!("'{api_url}' is not an http(s) URL"),
            ));
        }

        let timeout_secs = match lookup("STOREFRONT_HTTP_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "STOREFRONT_HTTP_TIMEOUT_SECS".to_string(),
                        format!("'{raw}' is not a positive number of seconds"),
                    ));
                }
            },
            None => DEFAULT_TIMEOUT_SECS,
        };

        let data_dir = match lookup("STOREFRONT_DATA_DIR") {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => storefront_cart::store::default_data_dir()
                .map_err(|e| ConfigError::DataDir(format!("{e:#}")))?,
        };

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs),
            data_dir,
        })
    }

    pub fn cart_store(&self) -> FileCartStore {
        FileCartStore::new(&self.data_dir)
    }

    /// The session's cart, rehydrated from the data directory.
    pub fn open_cart(&self) -> CartLedger {
        CartLedger::new(Arc::new(self.cart_store()))
    }
}
