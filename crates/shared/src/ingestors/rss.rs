use chrono::{DateTime, Utc};
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::{build_client, truncate_chars, MAX_SUMMARY_CHARS, MAX_TEXT_CHARS};
use crate::error::{DigestError, Result};
use crate::models::Article;

/// `config` block of an `rss` source
#[derive(Debug, Clone, Deserialize)]
pub struct RssSourceConfig {
    pub url: String,
}

/// Generic RSS/Atom feed ingestor. Remembers `ETag`/`Last-Modified` between
/// fetches so an unchanged feed costs a 304.
pub struct RssIngestor {
    client: Client,
    source_id: Option<i64>,
    feed_url: String,
    etag: Option<String>,
    last_modified: Option<String>,
}

impl RssIngestor {
    pub fn new(source_id: Option<i64>, config: RssSourceConfig) -> Result<Self> {
        Ok(Self::with_client(build_client()?, source_id, config.url))
    }

    pub fn with_client(client: Client, source_id: Option<i64>, feed_url: impl Into<String>) -> Self {
        Self {
            client,
            source_id,
            feed_url: feed_url.into(),
            etag: None,
            last_modified: None,
        }
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    /// Fetch errors are logged and yield no articles
    pub async fn fetch_articles(&mut self, since: DateTime<Utc>) -> Vec<Article> {
        match self.fetch(since).await {
            Ok(articles) => articles,
            Err(e) => {
                warn!(feed_url = %self.feed_url, error = %e, "Error fetching feed");
                Vec::new()
            }
        }
    }

    pub async fn fetch(&mut self, since: DateTime<Utc>) -> Result<Vec<Article>> {
        if self.feed_url.trim().is_empty() {
            return Err(DigestError::MissingConfig(format!(
                "no feed URL configured for source {:?}",
                self.source_id
            )));
        }

        let mut request = self.client.get(&self.feed_url);
        if let Some(etag) = &self.etag {
            request = request.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = &self.last_modified {
            request = request.header(IF_MODIFIED_SINCE, last_modified);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            debug!(feed_url = %self.feed_url, "feed not modified");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(DigestError::Status {
                status: status.as_u16(),
                url: self.feed_url.clone(),
            });
        }

        let header = |name| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.etag = header(ETAG);
        self.last_modified = header(LAST_MODIFIED);

        let bytes = response.bytes().await?;
        let articles = self.parse_feed(&bytes, since, Utc::now())?;

        info!(feed_url = %self.feed_url, count = articles.len(), "feed parsed");
        Ok(articles)
    }

    /// Articles from a raw feed document. Entries without a link or older
    /// than `since` are skipped; undated entries are stamped with `now`.
    pub fn parse_feed(
        &self,
        bytes: &[u8],
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Article>> {
        let feed = feed_rs::parser::parse(bytes).map_err(|e| DigestError::Feed(e.to_string()))?;
        let base = Url::parse(&self.feed_url).ok();

        let articles = feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                let published_at = entry.published.or(entry.updated);
                if matches!(published_at, Some(date) if date < since) {
                    return None;
                }

                let link = entry
                    .links
                    .first()
                    .map(|l| l.href.trim().to_string())
                    .filter(|href| !href.is_empty())?;
                let url = absolutize(&link, base.as_ref());

                let title = entry
                    .title
                    .map(|t| t.content)
                    .unwrap_or_else(|| "No Title".to_string());

                let mut article = Article::new(self.source_id, title, url, published_at.unwrap_or(now));

                if let Some(summary) = entry.summary.map(|s| s.content) {
                    article = article.with_summary(truncate_chars(&summary, MAX_SUMMARY_CHARS));
                }
                if let Some(body) = entry.content.and_then(|c| c.body) {
                    article = article.with_text(truncate_chars(&body, MAX_TEXT_CHARS));
                }

                Some(article)
            })
            .collect();

        Ok(articles)
    }
}

fn absolutize(link: &str, base: Option<&Url>) -> String {
    if let Ok(url) = Url::parse(link) {
        if url.has_host() {
            return url.to_string();
        }
    }

    base.and_then(|b| b.join(link).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| link.to_string())
}
