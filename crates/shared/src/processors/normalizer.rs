use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use regex::Regex;
use scraper::Html;
use std::sync::Arc;
use tracing::warn;
use url::Url;

use crate::canonical::CanonicalResolver;
use crate::models::Article;

const UNTITLED: &str = "Untitled";

const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "ref", "source"];
const TRACKING_PREFIX: &str = "utm_";

/// Cleans titles, URLs and text of raw articles
#[derive(Clone)]
pub struct ArticleNormalizer {
    resolver: Option<Arc<dyn CanonicalResolver>>,
    concurrency: usize,
    html_tag: Regex,
    severity_marker: Regex,
    site_suffix: Regex,
}

impl ArticleNormalizer {
    pub fn new(resolver: Option<Arc<dyn CanonicalResolver>>, concurrency: usize) -> Result<Self> {
        Ok(Self {
            resolver,
            concurrency: concurrency.max(1),
            html_tag: Regex::new(r"<[^>]+>").context("Invalid HTML tag pattern")?,
            severity_marker: Regex::new(r"(?i)^(BREAKING|UPDATE|EXCLUSIVE|URGENT):\s*")
                .context("Invalid severity marker pattern")?,
            // " - REUTERS", " - AL MONITOR"
            site_suffix: Regex::new(r"\s*-\s*[A-Z\s]+$").context("Invalid site suffix pattern")?,
        })
    }

    pub async fn normalize(&self, mut article: Article) -> Article {
        article.title = self.clean_title(&article.title);
        article.url = self.normalize_url(&article.url).await;
        article.summary_raw = article.summary_raw.as_deref().map(clean_text);
        article.text_raw = article.text_raw.as_deref().map(clean_text);
        article
    }

    /// Normalize each article on its own task. Output order matches input
    /// order, and an article whose task fails is passed through untouched.
    pub async fn normalize_batch(&self, articles: Vec<Article>) -> Vec<Article> {
        stream::iter(articles)
            .map(|article| {
                let normalizer = self.clone();
                let original = article.clone();
                async move {
                    let task = tokio::spawn(async move { normalizer.normalize(article).await });
                    match task.await {
                        Ok(normalized) => normalized,
                        Err(e) => {
                            warn!(title = %original.title, error = %e, "Error normalizing article, keeping original");
                            original
                        }
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    pub fn clean_title(&self, title: &str) -> String {
        let without_tags = self.html_tag.replace_all(title, "");
        let collapsed = collapse_whitespace(&without_tags);
        let without_marker = self.severity_marker.replace(&collapsed, "");
        let cleaned = self.site_suffix.replace(&without_marker, "");

        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            UNTITLED.to_string()
        } else {
            cleaned.to_string()
        }
    }

    /// Tracking parameters removed, then swapped for the canonical URL when
    /// the resolver finds one
    pub async fn normalize_url(&self, url: &str) -> String {
        let url = url.trim();
        if url.is_empty() {
            return String::new();
        }
        if url.starts_with("gmail:") {
            return url.to_string();
        }

        let Ok(parsed) = Url::parse(url) else {
            return url.to_string();
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return url.to_string();
        }

        let cleaned = strip_tracking_params(parsed);

        if let Some(resolver) = &self.resolver {
            if let Some(canonical) = resolver.resolve(&cleaned).await {
                return canonical;
            }
        }

        cleaned
    }
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with(TRACKING_PREFIX) || TRACKING_PARAMS.contains(&key)
}

fn strip_tracking_params(mut parsed: Url) -> String {
    if parsed.query().is_none() {
        return parsed.to_string();
    }

    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let kept: Vec<&(String, String)> = pairs.iter().filter(|(k, _)| !is_tracking_param(k)).collect();

    if kept.len() == pairs.len() && !pairs.is_empty() {
        return parsed.to_string();
    }

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed
            .query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    parsed.to_string()
}

/// Text content of an HTML fragment with whitespace collapsed
pub fn clean_text(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let fragment = Html::parse_fragment(text);
    let plain: String = fragment.root_element().text().collect();
    collapse_whitespace(&plain)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
