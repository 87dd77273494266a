// Source ingestors, one per source kind
pub mod reuters;
pub mod rss;

use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;
use tracing::warn;

use crate::config::Config;
use crate::error::Result;
use crate::models::{Article, SourceDefinition};

pub use reuters::{ReutersIngestor, ReutersSourceConfig};
pub use rss::{RssIngestor, RssSourceConfig};

pub const MAX_SUMMARY_CHARS: usize = 1000;
pub const MAX_TEXT_CHARS: usize = 5000;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// A configured source that can be polled for articles
pub enum Ingestor {
    Rss(RssIngestor),
    Reuters(ReutersIngestor),
}

impl Ingestor {
    /// Build the ingestor for a source. Returns `None` for inactive sources
    /// and for kinds this build does not fetch.
    pub fn from_source(source: &SourceDefinition, config: &Config) -> Result<Option<Self>> {
        if !source.is_active {
            return Ok(None);
        }

        let ingestor = match source.source_type.to_lowercase().as_str() {
            "rss" => {
                let rss_config: RssSourceConfig = serde_json::from_value(source.config.clone())?;
                Ingestor::Rss(RssIngestor::new(source.id, rss_config)?)
            }
            "reuters" => {
                let reuters_config: ReutersSourceConfig = if source.config.is_null() {
                    ReutersSourceConfig::default()
                } else {
                    serde_json::from_value(source.config.clone())?
                };
                Ingestor::Reuters(ReutersIngestor::new(
                    source.id,
                    config.reuters_api_key.clone(),
                    reuters_config,
                )?)
            }
            "gmail" => {
                warn!(source = %source.name, "Gmail sources are not fetched, skipping");
                return Ok(None);
            }
            other => {
                warn!(source = %source.name, source_type = other, "Unknown source type, skipping");
                return Ok(None);
            }
        };

        Ok(Some(ingestor))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Ingestor::Rss(_) => "rss",
            Ingestor::Reuters(_) => "reuters",
        }
    }

    /// Articles published at or after `since`. Fetch failures are logged
    /// by the ingestor and yield an empty list.
    pub async fn fetch_articles(&mut self, since: DateTime<Utc>) -> Vec<Article> {
        match self {
            Ingestor::Rss(ingestor) => ingestor.fetch_articles(since).await,
            Ingestor::Reuters(ingestor) => ingestor.fetch_articles(since).await,
        }
    }
}

pub(crate) fn build_client() -> Result<Client> {
    Ok(Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent("Mozilla/5.0 (compatible; MenaDigest/1.0)")
        .build()?)
}

/// First `max` characters of `text`
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
