use anyhow::{Context, Result};
use chrono::DateTime;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::models::{Article, DigestRecord, SourceDefinition, SourceMap, DIGEST_FORMAT_VERSION};

/// Persistence used by the pipeline
pub trait DigestStore: Send {
    /// Store the day's articles, assigning ids to those without one
    fn save_articles(&mut self, date: &str, articles: &mut [Article]) -> Result<PathBuf>;

    fn source_map(&self) -> SourceMap;

    fn save_digest(&mut self, record: &DigestRecord) -> Result<PathBuf>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SourcesFile {
    Wrapped { sources: Vec<SourceDefinition> },
    List(Vec<SourceDefinition>),
}

/// Load source definitions from a JSON file, either a bare list or
/// `{"sources": [...]}`. Entries without an id are numbered by position.
pub fn load_sources(path: &Path) -> Result<Vec<SourceDefinition>> {
    if !path.exists() {
        anyhow::bail!("Sources file not found: {}", path.display());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read sources file: {}", path.display()))?;

    let parsed: SourcesFile = serde_json::from_str(&content).with_context(|| {
        format!(
            "Failed to parse sources JSON from {}. Expected a list of sources or {{\"sources\": [...]}}.",
            path.display()
        )
    })?;

    let mut sources = match parsed {
        SourcesFile::Wrapped { sources } => sources,
        SourcesFile::List(sources) => sources,
    };

    for (index, source) in sources.iter_mut().enumerate() {
        if source.id.is_none() {
            source.id = Some(index as i64 + 1);
        }
    }

    Ok(sources)
}

/// JSON files under the data directory:
/// `articles/<date>.json` and `digests/<date>.json`
pub struct JsonStore {
    data_dir: PathBuf,
    sources: Vec<SourceDefinition>,
    next_article_id: i64,
}

impl JsonStore {
    pub fn open(data_dir: impl Into<PathBuf>, sources: Vec<SourceDefinition>) -> Result<Self> {
        let data_dir = data_dir.into();

        fs::create_dir_all(data_dir.join("articles")).context("Failed to create articles directory")?;
        fs::create_dir_all(data_dir.join("digests")).context("Failed to create digests directory")?;

        let next_article_id = max_saved_article_id(&data_dir.join("articles")) + 1;

        Ok(Self {
            data_dir,
            sources,
            next_article_id,
        })
    }

    pub fn sources(&self) -> &[SourceDefinition] {
        &self.sources
    }

    pub fn digests_dir(&self) -> PathBuf {
        self.data_dir.join("digests")
    }

    /// Saved digests, newest first
    pub fn list_digest_files(&self) -> Result<Vec<(PathBuf, DigestRecord)>> {
        list_digest_files(&self.digests_dir())
    }
}

impl DigestStore for JsonStore {
    fn save_articles(&mut self, date: &str, articles: &mut [Article]) -> Result<PathBuf> {
        for article in articles.iter_mut() {
            if article.id.is_none() {
                article.id = Some(self.next_article_id);
                self.next_article_id += 1;
            }
        }

        let filepath = self.data_dir.join("articles").join(format!("{}.json", date));
        let json = serde_json::to_string_pretty(&articles).context("Failed to serialize articles")?;
        fs::write(&filepath, json).context("Failed to write articles file")?;

        Ok(filepath)
    }

    fn source_map(&self) -> SourceMap {
        self.sources
            .iter()
            .filter_map(|source| source.id.map(|id| (id, source.info())))
            .collect()
    }

    fn save_digest(&mut self, record: &DigestRecord) -> Result<PathBuf> {
        let filepath = self.digests_dir().join(format!("{}.json", record.date));
        let json = serde_json::to_string_pretty(record).context("Failed to serialize digest")?;
        fs::write(&filepath, json).context("Failed to write digest file")?;

        Ok(filepath)
    }
}

fn max_saved_article_id(dir: &Path) -> i64 {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("json"))
        .filter_map(|path| fs::read_to_string(path).ok())
        .filter_map(|content| serde_json::from_str::<Vec<Article>>(&content).ok())
        .flatten()
        .filter_map(|article| article.id)
        .max()
        .unwrap_or(0)
}

/// Load a saved digest
pub fn load_digest(filepath: &Path) -> Result<DigestRecord> {
    if !filepath.exists() {
        anyhow::bail!("Digest file not found: {}", filepath.display());
    }

    let content = fs::read_to_string(filepath)
        .with_context(|| format!("Failed to read digest file: {}", filepath.display()))?;

    let record: DigestRecord = serde_json::from_str(&content).with_context(|| {
        format!(
            "Failed to parse digest JSON from {}. The file may be corrupted or not a valid digest file.",
            filepath.display()
        )
    })?;

    if record.version != DIGEST_FORMAT_VERSION {
        anyhow::bail!(
            "Unsupported digest file version: {}. Expected {}. Please regenerate the digest with build-digest.",
            record.version,
            DIGEST_FORMAT_VERSION
        );
    }

    Ok(record)
}

/// All readable digests in `dir`, newest first
pub fn list_digest_files(dir: &Path) -> Result<Vec<(PathBuf, DigestRecord)>> {
    let mut files = Vec::new();

    if dir.exists() {
        for entry in fs::read_dir(dir).context("Failed to read digests directory")? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                match load_digest(&path) {
                    Ok(record) => files.push((path, record)),
                    Err(e) => warn!(path = %path.display(), error = %e, "Could not load digest"),
                }
            }
        }
    }

    // Sort by digest date, then creation time (newest first)
    files.sort_by(|a, b| {
        let time_a = DateTime::parse_from_rfc3339(&a.1.created_at).ok();
        let time_b = DateTime::parse_from_rfc3339(&b.1.created_at).ok();
        (&b.1.date, time_b).cmp(&(&a.1.date, time_a))
    });

    Ok(files)
}
