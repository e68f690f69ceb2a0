use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::fetcher::RetryPolicy;

/// Environment variable overriding the configured API base URL
pub const API_URL_ENV: &str = "TOPLINE_API_URL";

const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Base URL of the aggregator API
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Ceiling for the whole first page load, retries included
    #[serde(default = "default_initial_load_timeout_secs")]
    pub initial_load_timeout_secs: u64,
    /// Expected number of items per feed page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_max_cache_entries")]
    pub max_cache_entries: usize,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_initial_load_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> usize {
    10
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_max_cache_entries() -> usize {
    50
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    8000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            request_timeout_secs: default_request_timeout_secs(),
            initial_load_timeout_secs: default_initial_load_timeout_secs(),
            page_size: default_page_size(),
            cache_ttl_secs: default_cache_ttl_secs(),
            max_cache_entries: default_max_cache_entries(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// The API base URL, with the deployment-time environment variable
    /// taking precedence over the configured value
    pub fn resolved_api_url(&self) -> String {
        std::env::var(API_URL_ENV).unwrap_or_else(|_| self.api_url.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn initial_load_timeout(&self) -> Duration {
        Duration::from_secs(self.initial_load_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}
