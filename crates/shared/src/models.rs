use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::summarizer::DigestSummary;

pub const DIGEST_FORMAT_VERSION: &str = "1.0";

/// Geographic bucket an article is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegionTag {
    Egypt,
    Ksa,
    Uae,
    #[default]
    Mena,
    Other,
}

impl RegionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionTag::Egypt => "EGYPT",
            RegionTag::Ksa => "KSA",
            RegionTag::Uae => "UAE",
            RegionTag::Mena => "MENA",
            RegionTag::Other => "OTHER",
        }
    }
}

impl fmt::Display for RegionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Topical bucket an article is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SectionTag {
    LogisticsShipping,
    PolicyRegulation,
    #[default]
    General,
}

impl SectionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionTag::LogisticsShipping => "LOGISTICS_SHIPPING",
            SectionTag::PolicyRegulation => "POLICY_REGULATION",
            SectionTag::General => "GENERAL",
        }
    }
}

impl fmt::Display for SectionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A news article as it moves through the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub source_id: Option<i64>,
    pub title: String,
    pub url: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub summary_raw: Option<String>,
    #[serde(default)]
    pub text_raw: Option<String>,
    #[serde(default)]
    pub region_tag: RegionTag,
    #[serde(default)]
    pub section_tag: SectionTag,
    #[serde(default)]
    pub content_hash: String,
    #[serde(default)]
    pub score: f64,
}

impl Article {
    pub fn new(
        source_id: Option<i64>,
        title: impl Into<String>,
        url: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            source_id,
            title: title.into(),
            url: url.into(),
            published_at,
            summary_raw: None,
            text_raw: None,
            region_tag: RegionTag::default(),
            section_tag: SectionTag::default(),
            content_hash: String::new(),
            score: 0.0,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary_raw = Some(summary.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_raw = Some(text.into());
        self
    }

    /// Lowercased title and summary, the text keyword tables are matched against
    pub fn keyword_text(&self) -> String {
        format!(
            "{} {}",
            self.title,
            self.summary_raw.as_deref().unwrap_or("")
        )
        .to_lowercase()
    }
}

/// Read-only view of a source used for ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: String,
}

impl SourceInfo {
    pub fn new(name: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_type: source_type.into(),
        }
    }
}

pub type SourceMap = HashMap<i64, SourceInfo>;

/// A source entry from the sources file. `config` stays untyped here and is
/// decoded into a per-kind struct when the ingestor is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDefinition {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub config: serde_json::Value,
}

fn default_active() -> bool {
    true
}

impl SourceDefinition {
    pub fn info(&self) -> SourceInfo {
        SourceInfo::new(self.name.clone(), self.source_type.clone())
    }
}

/// One line of a saved digest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestItem {
    pub id: Option<i64>,
    pub title: String,
    pub url: String,
    pub score: f64,
    pub region_tag: RegionTag,
    pub section_tag: SectionTag,
}

impl From<&Article> for DigestItem {
    fn from(article: &Article) -> Self {
        Self {
            id: article.id,
            title: article.title.clone(),
            url: article.url.clone(),
            score: article.score,
            region_tag: article.region_tag,
            section_tag: article.section_tag,
        }
    }
}

/// Complete digest data for serialization
#[derive(Debug, Serialize, Deserialize)]
pub struct DigestRecord {
    pub version: String,
    pub date: String,
    pub created_at: String,
    pub tl_dr: String,
    pub sections: BTreeMap<String, Vec<String>>,
    pub items: Vec<DigestItem>,
    pub html_path: Option<String>,
    pub md_path: Option<String>,
}

impl DigestRecord {
    pub fn new(date: impl Into<String>, summary: &DigestSummary, articles: &[Article]) -> Self {
        Self {
            version: DIGEST_FORMAT_VERSION.to_string(),
            date: date.into(),
            created_at: Utc::now().to_rfc3339(),
            tl_dr: summary.tl_dr.clone(),
            sections: summary.sections.clone(),
            items: articles.iter().map(DigestItem::from).collect(),
            html_path: None,
            md_path: None,
        }
    }

    pub fn summary(&self) -> DigestSummary {
        DigestSummary {
            tl_dr: self.tl_dr.clone(),
            sections: self.sections.clone(),
        }
    }
}

/// Parse a feed or API timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}
