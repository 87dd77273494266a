use anyhow::{Context, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::canonical::{CanonicalResolver, HttpCanonicalResolver};
use crate::config::Config;
use crate::delivery::{deliver_all, Deliverer, DeliveryPayload};
use crate::ingestors::Ingestor;
use crate::models::{Article, DigestRecord, SourceDefinition};
use crate::processors::{ArticleClassifier, ArticleDeduplicator, ArticleNormalizer, ArticleRanker};
use crate::renderer::{DigestRenderer, RenderedPaths};
use crate::store::DigestStore;
use crate::summarizer::{DigestSummarizer, DigestSummary};

struct SourceIngestor {
    name: String,
    ingestor: Ingestor,
}

/// Result of one digest run
#[derive(Debug)]
pub struct DigestOutcome {
    pub record: DigestRecord,
    pub digest_path: PathBuf,
    pub paths: RenderedPaths,
    pub fetched: usize,
    pub unique: usize,
    pub delivered: usize,
}

/// Runs fetch, normalize, classify, dedup, rank, summarize, render, save
/// and deliver for one date
pub struct DigestPipeline {
    normalizer: ArticleNormalizer,
    classifier: ArticleClassifier,
    deduplicator: ArticleDeduplicator,
    ranker: ArticleRanker,
    summarizer: DigestSummarizer,
    renderer: DigestRenderer,
    store: Box<dyn DigestStore>,
    deliverers: Vec<Box<dyn Deliverer>>,
    ingestors: Vec<SourceIngestor>,
    timezone: FixedOffset,
    lookback: Duration,
    top_k: usize,
}

impl DigestPipeline {
    pub fn new(
        config: &Config,
        sources: &[SourceDefinition],
        store: Box<dyn DigestStore>,
        deliverers: Vec<Box<dyn Deliverer>>,
    ) -> Result<Self> {
        let resolver: Option<Arc<dyn CanonicalResolver>> = if config.canonicalize_urls {
            Some(Arc::new(HttpCanonicalResolver::new(
                config.canonical_timeout,
                config.normalize_concurrency,
            )?))
        } else {
            None
        };

        let mut ingestors = Vec::new();
        for source in sources {
            match Ingestor::from_source(source, config) {
                Ok(Some(ingestor)) => ingestors.push(SourceIngestor {
                    name: source.name.clone(),
                    ingestor,
                }),
                Ok(None) => {}
                Err(e) => warn!(source = %source.name, error = %e, "Invalid source configuration, skipping"),
            }
        }

        Ok(Self {
            normalizer: ArticleNormalizer::new(resolver, config.normalize_concurrency)?,
            classifier: ArticleClassifier::new(),
            deduplicator: ArticleDeduplicator::new(),
            ranker: ArticleRanker::new(config.half_life_hours),
            summarizer: DigestSummarizer::new(config.anthropic_api_key.clone())?,
            renderer: DigestRenderer::new(&config.output_dir, config.digest_timezone()?),
            store,
            deliverers,
            ingestors,
            timezone: config.digest_timezone()?,
            lookback: Duration::hours(config.lookback_hours),
            top_k: config.top_k,
        })
    }

    /// Number of sources that will be fetched
    pub fn source_count(&self) -> usize {
        self.ingestors.len()
    }

    /// Date label and fetch window start. A given date starts at local
    /// midnight; otherwise the window ends now.
    pub fn digest_window(
        &self,
        date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>)> {
        let moment = match date {
            Some(date) => self
                .timezone
                .from_local_datetime(&date.and_time(NaiveTime::MIN))
                .single()
                .with_context(|| format!("Invalid digest date: {}", date))?,
            None => now.with_timezone(&self.timezone),
        };

        let since = moment.with_timezone(&Utc) - self.lookback;
        Ok((moment.format("%Y-%m-%d").to_string(), since))
    }

    pub async fn run(&mut self, date: Option<NaiveDate>) -> Result<DigestOutcome> {
        let (date_str, since) = self.digest_window(date, Utc::now())?;
        info!(date = %date_str, since = %since, sources = self.ingestors.len(), "Starting digest run");

        let articles = self.fetch_articles(since).await;
        self.build_digest(&date_str, articles).await
    }

    async fn fetch_articles(&mut self, since: DateTime<Utc>) -> Vec<Article> {
        let mut articles = Vec::new();

        for source in self.ingestors.iter_mut() {
            let batch = source.ingestor.fetch_articles(since).await;
            info!(
                source = %source.name,
                kind = source.ingestor.kind(),
                count = batch.len(),
                "Fetched articles"
            );
            articles.extend(batch);
        }

        articles
    }

    /// Normalize, classify and drop duplicates
    pub async fn prepare(&self, articles: Vec<Article>) -> Vec<Article> {
        let normalized = self.normalizer.normalize_batch(articles).await;
        let mut classified = self.classifier.classify_batch(normalized);
        self.deduplicator.deduplicate(&mut classified)
    }

    /// Everything after fetching. An empty batch still produces a digest.
    pub async fn build_digest(&mut self, date: &str, articles: Vec<Article>) -> Result<DigestOutcome> {
        let fetched = articles.len();

        if articles.is_empty() {
            info!(date, "No articles found, creating empty digest");
            return self.finish(date, DigestSummary::empty(), &[], 0, 0).await;
        }

        let mut unique = self.prepare(articles).await;
        info!(fetched, unique = unique.len(), "Articles processed");

        self.store
            .save_articles(date, &mut unique)
            .context("Failed to save articles")?;

        let source_map = self.store.source_map();
        let ranked = self.ranker.rank(unique, Some(&source_map));
        let unique_count = ranked.len();
        let top = self.ranker.top_k(&ranked, self.top_k);

        let summary = self.summarizer.summarize(&top, date).await;
        self.finish(date, summary, &top, fetched, unique_count).await
    }

    async fn finish(
        &mut self,
        date: &str,
        summary: DigestSummary,
        top: &[Article],
        fetched: usize,
        unique: usize,
    ) -> Result<DigestOutcome> {
        let paths = self
            .renderer
            .render(&summary, date)
            .context("Failed to render digest")?;

        let mut record = DigestRecord::new(date, &summary, top);
        record.html_path = Some(paths.html_path.display().to_string());
        record.md_path = Some(paths.md_path.display().to_string());

        let digest_path = self
            .store
            .save_digest(&record)
            .context("Failed to save digest")?;

        let payload = DeliveryPayload::new(date, summary.tl_dr.clone(), Some(&paths), top);
        let delivered = deliver_all(&self.deliverers, &payload).await;

        info!(date, items = record.items.len(), delivered, "Digest complete");

        Ok(DigestOutcome {
            record,
            digest_path,
            paths,
            fetched,
            unique,
            delivered,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SourceInfo, SourceMap};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Saved {
        articles: Vec<Article>,
        digests: Vec<String>,
    }

    struct MemoryStore {
        saved: Arc<Mutex<Saved>>,
    }

    impl DigestStore for MemoryStore {
        fn save_articles(&mut self, _date: &str, articles: &mut [Article]) -> Result<PathBuf> {
            let mut saved = self.saved.lock().unwrap();
            for article in articles.iter_mut() {
                article.id = Some(saved.articles.len() as i64 + 1);
                saved.articles.push(article.clone());
            }
            Ok(PathBuf::from("memory"))
        }

        fn source_map(&self) -> SourceMap {
            let mut map = SourceMap::new();
            map.insert(1, SourceInfo::new("Reuters", "reuters"));
            map.insert(2, SourceInfo::new("Local", "rss"));
            map
        }

        fn save_digest(&mut self, record: &DigestRecord) -> Result<PathBuf> {
            self.saved.lock().unwrap().digests.push(record.tl_dr.clone());
            Ok(PathBuf::from(format!("memory/{}.json", record.date)))
        }
    }

    struct CountingDelivery {
        count: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl Deliverer for CountingDelivery {
        fn name(&self) -> &str {
            "counting"
        }

        async fn deliver(&self, _payload: &DeliveryPayload) -> Result<()> {
            *self.count.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn pipeline(output_dir: &std::path::Path) -> (DigestPipeline, Arc<Mutex<Saved>>, Arc<Mutex<usize>>) {
        let config = Config {
            output_dir: output_dir.to_path_buf(),
            canonicalize_urls: false,
            top_k: 2,
            ..Config::default()
        };
        let saved = Arc::new(Mutex::new(Saved::default()));
        let count = Arc::new(Mutex::new(0));

        let pipeline = DigestPipeline::new(
            &config,
            &[],
            Box::new(MemoryStore {
                saved: saved.clone(),
            }),
            vec![Box::new(CountingDelivery {
                count: count.clone(),
            })],
        )
        .unwrap();

        (pipeline, saved, count)
    }

    fn article(source_id: i64, title: &str, url: &str, hours_ago: i64) -> Article {
        Article::new(
            Some(source_id),
            title,
            url,
            Utc::now() - Duration::hours(hours_ago),
        )
    }

    #[tokio::test]
    async fn test_empty_run_still_renders_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let (mut pipeline, saved, count) = pipeline(dir.path());

        let outcome = pipeline.build_digest("2026-02-01", Vec::new()).await.unwrap();

        assert_eq!(outcome.record.tl_dr, "No major updates today.");
        assert!(outcome.record.items.is_empty());
        assert!(outcome.paths.html_path.exists());
        assert!(outcome.paths.md_path.exists());
        assert_eq!(saved.lock().unwrap().digests.len(), 1);
        assert!(saved.lock().unwrap().articles.is_empty());
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_full_run_dedups_ranks_and_delivers() {
        let dir = tempfile::tempdir().unwrap();
        let (mut pipeline, saved, count) = pipeline(dir.path());

        let articles = vec![
            article(2, "BREAKING: Egypt port fees rise", "https://a.com/port?utm_source=x", 2),
            article(2, "Egypt port fees rise", "https://a.com/port", 1),
            article(1, "Dubai logistics hub opens", "https://b.com/hub", 3),
            article(2, "Weather update", "https://c.com/weather", 40),
        ];

        let outcome = pipeline.build_digest("2026-02-01", articles).await.unwrap();

        assert_eq!(outcome.fetched, 4);
        assert_eq!(outcome.unique, 3);
        assert_eq!(saved.lock().unwrap().articles.len(), 3);

        // top_k = 2, Reuters-weighted logistics story first
        let titles: Vec<_> = outcome.record.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Dubai logistics hub opens", "Egypt port fees rise"]);
        assert!(outcome.record.items.iter().all(|i| i.id.is_some()));

        assert!(outcome.record.tl_dr.starts_with("Today's top stories:"));
        assert_eq!(outcome.record.md_path.as_deref(), Some(outcome.paths.md_path.to_str().unwrap()));
        assert_eq!(outcome.delivered, 1);
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_prepare_keeps_first_duplicate_and_tags() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _, _) = pipeline(dir.path());

        let prepared = pipeline
            .prepare(vec![
                article(1, "Riyadh NEOM update", "https://a.com/neom?fbclid=1", 1),
                article(1, "Riyadh NEOM update", "https://a.com/neom", 1),
            ])
            .await;

        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].url, "https://a.com/neom");
        assert_eq!(prepared[0].region_tag, crate::models::RegionTag::Ksa);
        assert_eq!(prepared[0].content_hash.len(), 16);
    }

    #[test]
    fn test_digest_window() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _, _) = pipeline(dir.path());

        // 23:30 UTC is already the next day at UTC+2
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 23, 30, 0).unwrap();
        let (date, since) = pipeline.digest_window(None, now).unwrap();
        assert_eq!(date, "2026-02-02");
        assert_eq!(since, now - Duration::hours(24));

        let given = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let (date, since) = pipeline.digest_window(Some(given), now).unwrap();
        assert_eq!(date, "2026-01-15");
        assert_eq!(since, Utc.with_ymd_and_hms(2026, 1, 13, 22, 0, 0).unwrap());
    }
}
