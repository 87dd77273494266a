use sha2::{Digest, Sha256};
use std::collections::HashSet;
use url::Url;

use crate::models::Article;

pub const HASH_LEN: usize = 16;

const GMAIL_SCHEME: &str = "gmail:";
const UNKNOWN_DOMAIN: &str = "unknown";

/// Drops repeated articles by content fingerprint, keeping the first occurrence
#[derive(Debug, Default, Clone, Copy)]
pub struct ArticleDeduplicator;

impl ArticleDeduplicator {
    pub fn new() -> Self {
        Self
    }

    /// Writes `content_hash` onto every article and returns the first occurrence
    /// of each fingerprint, in input order.
    pub fn deduplicate(&self, articles: &mut [Article]) -> Vec<Article> {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(articles.len());

        for article in articles.iter_mut() {
            article.content_hash = self.fingerprint(article);
            if seen.insert(article.content_hash.clone()) {
                unique.push(article.clone());
            }
        }

        unique
    }

    /// 16 hex character fingerprint of an article
    pub fn fingerprint(&self, article: &Article) -> String {
        if let Some(canonical) = canonical_form(&article.url) {
            return short_hash(&canonical);
        }

        let domain = extract_domain(&article.url);
        let title = normalize_title(&article.title);
        short_hash(&format!("{}:{}", domain, title))
    }
}

/// `scheme://host[:port]path` without query, fragment or trailing slashes.
/// `None` for pseudo-URLs and anything without a host.
fn canonical_form(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with(GMAIL_SCHEME) {
        return None;
    }

    let parsed = Url::parse(raw).ok()?;
    let host = parsed.host_str()?;
    let authority = match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    let normalized = format!("{}://{}{}", parsed.scheme(), authority, parsed.path());
    Some(normalized.trim_end_matches('/').to_string())
}

fn extract_domain(raw: &str) -> String {
    Url::parse(raw.trim())
        .ok()
        .and_then(|u| {
            u.host_str().map(|host| match u.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            })
        })
        .unwrap_or_else(|| UNKNOWN_DOMAIN.to_string())
}

/// Lowercase, drop ASCII punctuation, collapse whitespace
pub fn normalize_title(title: &str) -> String {
    let stripped: String = title
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(HASH_LEN);
    hex
}
