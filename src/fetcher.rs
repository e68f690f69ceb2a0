use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{self, CategoryList, NewsItem};

/// Exponential backoff schedule: the delay doubles from `base_delay` on
/// every attempt, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay to wait after the given zero-based failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// HTTP client for the aggregator API. Stateless beyond the connection
/// pool; response caching is the caller's concern.
pub struct Fetcher {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(base_url: &str, config: &Config) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent("Topline/1.0 (News Client)")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: config.retry_policy(),
        }
    }

    /// Fetch one page of the categorized news feed
    pub async fn news(&self, category: &str, page: u32) -> Result<Vec<NewsItem>> {
        let url = format!("{}/api/news", self.base_url);
        let query = [
            ("category", category.to_string()),
            ("page", page.to_string()),
        ];
        let value = self.get_json_with_retry(&url, &query).await?;
        models::items_from_value(value)
    }

    /// Fetch the unpaginated trending list
    pub async fn trending(&self) -> Result<Vec<NewsItem>> {
        let url = format!("{}/api/trending", self.base_url);
        let value = self.get_json_with_retry(&url, &[]).await?;
        models::items_from_value(value)
    }

    /// Fetch the category names the backend serves
    pub async fn categories(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/categories", self.base_url);
        let value = self.get_json_with_retry(&url, &[]).await?;
        let list: CategoryList = serde_json::from_value(value)?;
        Ok(list.categories)
    }

    /// Fetch a single item by its URL (the item id). Unknown items map to
    /// None rather than an error.
    pub async fn news_detail(&self, item_url: &str) -> Result<Option<NewsItem>> {
        let url = format!(
            "{}/api/news/{}",
            self.base_url,
            urlencoding::encode(item_url)
        );
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let value: Value = response.error_for_status()?.json().await?;
        Ok(Some(serde_json::from_value(value)?))
    }

    async fn get_json_with_retry(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let mut attempt = 0;
        loop {
            match self.get_json(url, query).await {
                Ok(value) => return Ok(value),
                Err(error) if !error.is_transient() => return Err(error),
                Err(error) if attempt + 1 < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(url, attempt, ?delay, error = %error, "Request failed, retrying");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    if attempt == 0 {
                        return Err(error);
                    }
                    return Err(Error::RetriesExhausted {
                        attempts: attempt + 1,
                        source: Box::new(error),
                    });
                }
            }
        }
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send().await?.error_for_status()?;
        debug!(url, "Request succeeded");
        Ok(response.json().await?)
    }
}
