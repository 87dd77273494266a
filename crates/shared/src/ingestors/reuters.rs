use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use super::rss::RssIngestor;
use super::{build_client, truncate_chars, MAX_SUMMARY_CHARS, MAX_TEXT_CHARS};
use crate::error::{DigestError, Result};
use crate::models::{parse_timestamp, Article};

pub const REUTERS_API_BASE: &str = "https://wireapi.reuters.com/v8";

const REUTERS_RSS_FEEDS: &[(&str, &str)] = &[
    ("middle-east", "https://www.reuters.com/world/middle-east/rss"),
    ("africa", "https://www.reuters.com/world/africa/rss"),
    ("business", "https://www.reuters.com/business/rss"),
];

const PAGE_LIMIT: usize = 50;

/// `config` block of a `reuters` source
#[derive(Debug, Clone, Deserialize)]
pub struct ReutersSourceConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
}

impl Default for ReutersSourceConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            topics: default_topics(),
        }
    }
}

fn default_region() -> String {
    "MENA".to_string()
}

fn default_topics() -> Vec<String> {
    vec!["TopNews".to_string()]
}

#[derive(Debug, Deserialize)]
struct ArticlesResponse {
    #[serde(default)]
    articles: Vec<WireArticle>,
}

#[derive(Debug, Default, Deserialize)]
struct WireArticle {
    #[serde(default)]
    headline: Option<Headline>,
    #[serde(default)]
    canonical_url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Headline {
    #[serde(default)]
    main: String,
}

/// Reuters wire API client. Without an API key it reads the public Reuters
/// RSS feeds instead.
pub struct ReutersIngestor {
    client: Client,
    source_id: Option<i64>,
    api_key: Option<String>,
    config: ReutersSourceConfig,
    fallback: Vec<RssIngestor>,
}

impl ReutersIngestor {
    pub fn new(
        source_id: Option<i64>,
        api_key: Option<String>,
        config: ReutersSourceConfig,
    ) -> Result<Self> {
        let client = build_client()?;

        let fallback = REUTERS_RSS_FEEDS
            .iter()
            .map(|(_, url)| RssIngestor::with_client(client.clone(), source_id, *url))
            .collect();

        Ok(Self {
            client,
            source_id,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            config,
            fallback,
        })
    }

    pub fn uses_api(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn fetch_articles(&mut self, since: DateTime<Utc>) -> Vec<Article> {
        match self.api_key.clone() {
            Some(api_key) => self.fetch_from_api(&api_key, since).await,
            None => self.fetch_from_rss(since).await,
        }
    }

    async fn fetch_from_api(&self, api_key: &str, since: DateTime<Utc>) -> Vec<Article> {
        let mut articles = Vec::new();

        for topic in &self.config.topics {
            match self.fetch_topic(api_key, topic, since).await {
                Ok(batch) => {
                    info!(topic = %topic, count = batch.len(), "Reuters topic fetched");
                    articles.extend(batch);
                }
                Err(e) => {
                    warn!(topic = %topic, error = %e, "Error fetching Reuters API topic");
                }
            }
        }

        articles
    }

    async fn fetch_topic(
        &self,
        api_key: &str,
        topic: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Article>> {
        let url = format!(
            "{}/articles?topic={}&region={}&since={}&limit={}",
            REUTERS_API_BASE,
            urlencoding::encode(topic),
            urlencoding::encode(&self.config.region),
            urlencoding::encode(&since.to_rfc3339()),
            PAGE_LIMIT
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        parse_articles_response(&body, self.source_id, Utc::now())
    }

    async fn fetch_from_rss(&mut self, since: DateTime<Utc>) -> Vec<Article> {
        let mut articles = Vec::new();

        for (ingestor, (feed_name, _)) in self.fallback.iter_mut().zip(REUTERS_RSS_FEEDS) {
            match ingestor.fetch(since).await {
                Ok(batch) => articles.extend(batch),
                Err(e) => warn!(feed = %feed_name, error = %e, "Error fetching Reuters RSS feed"),
            }
        }

        articles
    }
}

fn parse_articles_response(
    body: &str,
    source_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Vec<Article>> {
    let response: ArticlesResponse = serde_json::from_str(body)?;

    Ok(response
        .articles
        .into_iter()
        .filter_map(|item| wire_article(item, source_id, now))
        .collect())
}

fn wire_article(item: WireArticle, source_id: Option<i64>, now: DateTime<Utc>) -> Option<Article> {
    let title = item.headline.map(|h| h.main).filter(|t| !t.trim().is_empty())?;
    let url = item.canonical_url.filter(|u| !u.trim().is_empty())?;

    let published_at = item
        .published_at
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(now);

    let mut article = Article::new(source_id, title, url, published_at);
    if let Some(description) = item.description.filter(|d| !d.is_empty()) {
        article = article.with_summary(truncate_chars(&description, MAX_SUMMARY_CHARS));
    }
    if let Some(body) = item.body.filter(|b| !b.is_empty()) {
        article = article.with_text(truncate_chars(&body, MAX_TEXT_CHARS));
    }

    Some(article)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_wire_articles() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        let body = r#"{
            "articles": [
                {
                    "headline": {"main": "Saudi Aramco prices bond"},
                    "canonical_url": "https://www.reuters.com/business/aramco-bond",
                    "published_at": "2026-03-02T06:30:00Z",
                    "description": "Aramco priced a $5 billion bond",
                    "body": "Full story text"
                },
                {
                    "headline": {"main": ""},
                    "canonical_url": "https://www.reuters.com/no-title"
                },
                {
                    "headline": {"main": "No URL here"}
                },
                {
                    "headline": {"main": "Bad date"},
                    "canonical_url": "https://www.reuters.com/bad-date",
                    "published_at": "yesterday-ish"
                }
            ]
        }"#;

        let articles = parse_articles_response(body, Some(3), now).unwrap();
        assert_eq!(articles.len(), 2);

        assert_eq!(articles[0].title, "Saudi Aramco prices bond");
        assert_eq!(articles[0].source_id, Some(3));
        assert_eq!(
            articles[0].published_at,
            Utc.with_ymd_and_hms(2026, 3, 2, 6, 30, 0).unwrap()
        );
        assert_eq!(articles[0].summary_raw.as_deref(), Some("Aramco priced a $5 billion bond"));
        assert_eq!(articles[0].text_raw.as_deref(), Some("Full story text"));

        assert_eq!(articles[1].title, "Bad date");
        assert_eq!(articles[1].published_at, now);
        assert!(articles[1].summary_raw.is_none());
    }

    #[test]
    fn test_missing_articles_field_is_empty() {
        let articles = parse_articles_response("{}", None, Utc::now()).unwrap();
        assert!(articles.is_empty());
    }

    #[test]
    fn test_body_is_truncated() {
        let item = WireArticle {
            headline: Some(Headline { main: "Long".to_string() }),
            canonical_url: Some("https://www.reuters.com/long".to_string()),
            body: Some("x".repeat(MAX_TEXT_CHARS + 100)),
            ..Default::default()
        };
        let article = wire_article(item, None, Utc::now()).unwrap();
        assert_eq!(article.text_raw.map(|t| t.chars().count()), Some(MAX_TEXT_CHARS));
    }

    #[test]
    fn test_config_defaults() {
        let config: ReutersSourceConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(config.region, "MENA");
        assert_eq!(config.topics, vec!["TopNews".to_string()]);
    }

    #[test]
    fn test_blank_api_key_means_rss_fallback() {
        let ingestor =
            ReutersIngestor::new(Some(1), Some("  ".to_string()), ReutersSourceConfig::default())
                .unwrap();
        assert!(!ingestor.uses_api());
        assert_eq!(ingestor.fallback.len(), REUTERS_RSS_FEEDS.len());
        assert_eq!(
            ingestor.fallback[0].feed_url(),
            "https://www.reuters.com/world/middle-east/rss"
        );
    }
}
