use anyhow::Context;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::error::{DigestError, Result};
use crate::models::Article;

pub const EMPTY_TL_DR: &str = "No major updates today.";

const CLAUDE_MODEL: &str = "claude-sonnet-4-5";
const MAX_ATTEMPTS: u32 = 3;
const EXTRACTIVE_LIMIT: usize = 10;

const SYSTEM_PROMPT: &str = "You summarize news for a busy operator in MENA logistics/tech. \
Be concise, factual, and neutral. Always attach the best link per bullet.";

/// TL;DR plus bullets keyed by section name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DigestSummary {
    pub tl_dr: String,
    #[serde(default)]
    pub sections: BTreeMap<String, Vec<String>>,
}

impl DigestSummary {
    pub fn empty() -> Self {
        Self {
            tl_dr: EMPTY_TL_DR.to_string(),
            sections: BTreeMap::new(),
        }
    }

    pub fn bullet_count(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }
}

#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct ArticlePayload<'a> {
    title: &'a str,
    url: &'a str,
    summary: &'a str,
    region: &'static str,
    section: &'static str,
    published_at: String,
}

/// Turns the ranked top articles into a digest summary. Uses Claude when an
/// API key is configured and falls back to an extractive summary otherwise.
pub struct DigestSummarizer {
    client: Client,
    api_key: Option<String>,
}

impl DigestSummarizer {
    pub fn new(api_key: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn uses_llm(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn summarize(&self, articles: &[Article], date: &str) -> DigestSummary {
        if articles.is_empty() {
            return DigestSummary::empty();
        }

        if let Some(api_key) = &self.api_key {
            match self.llm_summarize(api_key, articles, date).await {
                Ok(summary) => return summary,
                Err(e) => warn!(error = %e, "LLM summarization failed, falling back to extractive"),
            }
        }

        extractive_summary(articles)
    }

    async fn llm_summarize(
        &self,
        api_key: &str,
        articles: &[Article],
        date: &str,
    ) -> Result<DigestSummary> {
        let prompt = build_prompt(articles, date)?;
        let mut last_error = DigestError::Summarizer("no attempts made".to_string());

        for attempt in 0..MAX_ATTEMPTS {
            match self.try_summarize(api_key, &prompt).await {
                Ok(summary) => {
                    info!(sections = summary.sections.len(), "LLM summary received");
                    return Ok(summary);
                }
                Err(e) => {
                    let is_rate_limit = matches!(e, DigestError::Status { status: 429, .. });

                    // Longer backoff for rate limits
                    let backoff = if is_rate_limit {
                        std::time::Duration::from_secs(15 * (attempt + 1) as u64)
                    } else {
                        std::time::Duration::from_millis(1000 * 2_u64.pow(attempt))
                    };

                    warn!(attempt = attempt + 1, error = %e, "Summarization attempt failed");
                    last_error = e;

                    if attempt + 1 < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        Err(last_error)
    }

    async fn try_summarize(&self, api_key: &str, prompt: &str) -> Result<DigestSummary> {
        let request = ClaudeRequest {
            model: CLAUDE_MODEL.to_string(),
            max_tokens: 2000,
            temperature: 0.3,
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let url = "https://api.anthropic.com/v1/messages";
        let response = self
            .client
            .post(url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let claude_response = response.json::<ClaudeResponse>().await?;

        let text = claude_response
            .content
            .first()
            .map(|c| c.text.as_str())
            .unwrap_or("");

        parse_llm_reply(text)
    }
}

fn build_prompt(articles: &[Article], date: &str) -> Result<String> {
    let payload: Vec<ArticlePayload> = articles
        .iter()
        .map(|a| ArticlePayload {
            title: &a.title,
            url: &a.url,
            summary: a.summary_raw.as_deref().unwrap_or(""),
            region: a.region_tag.as_str(),
            section: a.section_tag.as_str(),
            published_at: a.published_at.to_rfc3339(),
        })
        .collect();

    let articles_json = serde_json::to_string_pretty(&payload)?;

    Ok(format!(
        r#"Summarize these articles into:
1) TL;DR (3-4 sentences max).
2) Bullets grouped by sections: EGYPT, KSA, UAE, LOGISTICS/SHIPPING, POLICY/REGULATION.
3) Each bullet: one line, start with a short headline, then a single link in parentheses.

Date: {date} (Africa/Cairo)
Articles (JSON):
{articles_json}

Notes: Prefer Reuters and Enterprise links when duplicates exist. Avoid clickbait.

Respond in JSON format:
{{
  "tl_dr": "Your 3-4 sentence summary here",
  "sections": {{
    "EGYPT": ["bullet with (link)", ...],
    "KSA": ["bullet with (link)", ...],
    "UAE": ["bullet with (link)", ...],
    "LOGISTICS_SHIPPING": ["bullet with (link)", ...],
    "POLICY_REGULATION": ["bullet with (link)", ...]
  }}
}}

Only include sections that have content. Each bullet must include a link in parentheses."#
    ))
}

/// Parse the model's JSON reply, with or without a markdown code fence
pub fn parse_llm_reply(text: &str) -> Result<DigestSummary> {
    let body = match text.find("```json") {
        Some(start) => {
            let rest = &text[start + "```json".len()..];
            rest.find("```").map_or(rest, |end| &rest[..end]).to_string()
        }
        None if text.contains("```") => text
            .lines()
            .filter(|line| !line.trim_start().starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n"),
        None => text.to_string(),
    };

    let mut summary: DigestSummary = serde_json::from_str(body.trim())?;
    summary.sections.retain(|_, bullets| !bullets.is_empty());

    if summary.tl_dr.trim().is_empty() {
        return Err(DigestError::Summarizer("reply has no TL;DR".to_string()));
    }

    Ok(summary)
}

/// Summary built straight from the article list, no model involved
pub fn extractive_summary(articles: &[Article]) -> DigestSummary {
    if articles.is_empty() {
        return DigestSummary::empty();
    }

    let mut sections: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for article in articles.iter().take(EXTRACTIVE_LIMIT) {
        sections
            .entry(article.section_tag.as_str().to_string())
            .or_default()
            .push(format!("{} ({})", article.title, article.url));
    }

    let titles: Vec<&str> = articles.iter().take(3).map(|a| a.title.as_str()).collect();
    let tl_dr = match titles.as_slice() {
        [first, second, third] => {
            format!("Today's top stories: {}, {}, and {}.", first, second, third)
        }
        _ => format!("Today's top stories: {}.", titles.join(", ")),
    };

    DigestSummary { tl_dr, sections }
}
