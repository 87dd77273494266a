use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

// The <head> is expected to sit inside the first 10KB of a page.
const HEAD_SCAN_BYTES: usize = 10_000;

/// Looks up the canonical form of an article URL.
///
/// `None` means "no canonical URL found". Timeouts and network errors are
/// reported that way as well, never as errors.
#[async_trait]
pub trait CanonicalResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Option<String>;
}

pub struct HttpCanonicalResolver {
    client: Client,
    semaphore: Arc<Semaphore>,
}

impl HttpCanonicalResolver {
    pub fn new(timeout: Duration, max_concurrent: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (compatible; MenaDigest/1.0)")
            .build()
            .context("Failed to create HTTP client")?;

        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));

        Ok(Self { client, semaphore })
    }

    async fn try_resolve(&self, url: &str) -> Result<Option<String>> {
        let mut response = self
            .client
            .head(url)
            .send()
            .await
            .context("Failed to send HEAD request")?;

        // Some servers reject HEAD outright
        if response.status().as_u16() >= 400 {
            response = self
                .client
                .get(url)
                .send()
                .await
                .context("Failed to send GET request")?;
        }

        let final_url = response.url().to_string();

        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("text/html"))
            .unwrap_or(false);

        if !is_html {
            return Ok(Some(final_url));
        }

        let html = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to fetch page")?
            .text()
            .await
            .context("Failed to read response body")?;

        let head = truncate_at_char_boundary(&html, HEAD_SCAN_BYTES);

        Ok(extract_canonical_link(head, url).or(Some(final_url)))
    }
}

#[async_trait]
impl CanonicalResolver for HttpCanonicalResolver {
    async fn resolve(&self, url: &str) -> Option<String> {
        let _permit = self.semaphore.acquire().await.ok()?;

        match self.try_resolve(url).await {
            Ok(canonical) => canonical.filter(|c| !c.is_empty()),
            Err(e) => {
                tracing::debug!(url, error = %e, "canonical lookup failed");
                None
            }
        }
    }
}

/// `href` of `<link rel="canonical">`, made absolute against `page_url`
pub fn extract_canonical_link(html: &str, page_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"link[rel="canonical"]"#).ok()?;

    let href = document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())?;

    match Url::parse(href) {
        Ok(absolute) => Some(absolute.to_string()),
        Err(_) => Url::parse(page_url)
            .ok()?
            .join(href)
            .ok()
            .map(|u| u.to_string()),
    }
}

fn truncate_at_char_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
