use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::models::Article;
use crate::renderer::RenderedPaths;

pub const TOP_LINKS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct TopLink {
    pub title: String,
    pub url: String,
}

/// Everything a channel needs to announce one digest
#[derive(Debug, Clone)]
pub struct DeliveryPayload {
    pub date: String,
    pub tl_dr: String,
    pub html_path: Option<PathBuf>,
    pub md_path: Option<PathBuf>,
    pub top_links: Vec<TopLink>,
}

impl DeliveryPayload {
    pub fn new(
        date: impl Into<String>,
        tl_dr: impl Into<String>,
        paths: Option<&RenderedPaths>,
        articles: &[Article],
    ) -> Self {
        Self {
            date: date.into(),
            tl_dr: tl_dr.into(),
            html_path: paths.map(|p| p.html_path.clone()),
            md_path: paths.map(|p| p.md_path.clone()),
            top_links: articles
                .iter()
                .take(TOP_LINKS)
                .map(|a| TopLink {
                    title: a.title.clone(),
                    url: a.url.clone(),
                })
                .collect(),
        }
    }
}

/// A channel a finished digest is pushed to
#[async_trait]
pub trait Deliverer: Send + Sync {
    fn name(&self) -> &str;
    async fn deliver(&self, payload: &DeliveryPayload) -> Result<()>;
}

/// Markdown chat message: title line, TL;DR, numbered top links
pub fn format_digest_message(payload: &DeliveryPayload) -> String {
    let mut message = format!("*MENA Daily TL;DR — {}*\n\n", payload.date);
    message.push_str(&format!("{}\n\n", payload.tl_dr));

    if !payload.top_links.is_empty() {
        message.push_str("*Top Stories:*\n");
        for (i, link) in payload.top_links.iter().take(TOP_LINKS).enumerate() {
            message.push_str(&format!("{}. [{}]({})\n", i + 1, link.title, link.url));
        }
    }

    message
}

/// Prints the chat message to stdout
pub struct ConsoleDelivery;

#[async_trait]
impl Deliverer for ConsoleDelivery {
    fn name(&self) -> &str {
        "console"
    }

    async fn deliver(&self, payload: &DeliveryPayload) -> Result<()> {
        println!("\n{}", format_digest_message(payload));
        if let Some(path) = &payload.html_path {
            println!("📄 HTML: {}", path.display());
        }
        if let Some(path) = &payload.md_path {
            println!("📝 Markdown: {}", path.display());
        }
        Ok(())
    }
}

/// Run every channel. Failures are logged and do not stop the others.
/// Returns the number of channels that succeeded.
pub async fn deliver_all(deliverers: &[Box<dyn Deliverer>], payload: &DeliveryPayload) -> usize {
    let mut delivered = 0;

    for deliverer in deliverers {
        match deliverer.deliver(payload).await {
            Ok(()) => {
                info!(channel = deliverer.name(), "Digest delivered");
                delivered += 1;
            }
            Err(e) => {
                warn!(channel = deliverer.name(), error = %e, "Digest delivery failed");
            }
        }
    }

    delivered
}
