use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A single aggregated article as delivered by the news API.
///
/// Identity is the `url`; items with the same url are considered the same
/// article when building a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub source: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub published_at: Option<DateTime<Utc>>,
    /// Upstream provenance marker, e.g. "newsapi" or "rss-most-read"
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

fn default_category() -> String {
    "general".to_string()
}

/// Response body of the categories endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryList {
    pub categories: Vec<String>,
}

// RSS-derived items arrive with RFC 2822 dates, API-derived ones with
// RFC 3339; anything unparseable becomes None rather than a hard error.
fn lenient_datetime<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_published_at))
}

pub fn parse_published_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Known wrapper fields for endpoints that return an object instead of a
/// bare array (the aggregator forwards NewsAPI- and WorldNews-shaped bodies)
const WRAPPER_FIELDS: [&str; 4] = ["articles", "news", "items", "data"];

/// Extract the item list from a response body, accepting either a raw
/// array or an object wrapping the array under a known field.
pub fn items_from_value(value: Value) -> Result<Vec<NewsItem>> {
    match value {
        Value::Array(_) => Ok(serde_json::from_value(value)?),
        Value::Object(mut map) => {
            for field in WRAPPER_FIELDS {
                if let Some(inner @ Value::Array(_)) = map.remove(field) {
                    return Ok(serde_json::from_value(inner)?);
                }
            }
            Err(Error::Format(
                "object response carries no recognized item list".to_string(),
            ))
        }
        other => Err(Error::Format(format!(
            "expected an array or wrapping object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
