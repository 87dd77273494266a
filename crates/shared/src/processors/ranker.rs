use chrono::{DateTime, Utc};

use crate::models::{Article, SourceMap};

pub const DEFAULT_HALF_LIFE_HOURS: f64 = 36.0;

// Matched by substring against the source type, first hit wins.
const SOURCE_WEIGHTS: &[(&str, f64)] = &[
    ("reuters", 2.0),
    ("enterprise", 1.8),
    ("gmail", 1.5), // Enterprise via Gmail
    ("rss", 1.0),
];

const KEYWORD_BOOSTS: &[(&str, f64)] = &[
    ("fx", 1.5),
    ("foreign exchange", 1.5),
    ("currency", 1.3),
    ("budget", 1.4),
    ("shipping", 1.3),
    ("port", 1.3),
    ("logistics", 1.2),
    ("suez", 1.4),
    ("oil", 1.3),
    ("gas", 1.2),
    ("ipo", 1.5),
    ("listing", 1.4),
    ("investment", 1.2),
    ("merger", 1.4),
    ("acquisition", 1.4),
    ("policy", 1.2),
    ("regulation", 1.2),
    ("central bank", 1.5),
    ("interest rate", 1.4),
];

/// Scores articles by recency, source weight and keyword boost
#[derive(Debug, Clone, Copy)]
pub struct ArticleRanker {
    half_life_hours: f64,
}

impl Default for ArticleRanker {
    fn default() -> Self {
        Self::new(DEFAULT_HALF_LIFE_HOURS)
    }
}

impl ArticleRanker {
    pub fn new(half_life_hours: f64) -> Self {
        Self { half_life_hours }
    }

    pub fn half_life_hours(&self) -> f64 {
        self.half_life_hours
    }

    /// Score every article against the current time and sort highest first
    pub fn rank(&self, articles: Vec<Article>, sources: Option<&SourceMap>) -> Vec<Article> {
        self.rank_at(articles, sources, Utc::now())
    }

    /// Same as [`rank`](Self::rank) with an explicit clock. Ties keep input order.
    pub fn rank_at(
        &self,
        mut articles: Vec<Article>,
        sources: Option<&SourceMap>,
        now: DateTime<Utc>,
    ) -> Vec<Article> {
        for article in articles.iter_mut() {
            article.score = self.score(article, sources, now);
        }

        articles.sort_by(|a, b| b.score.total_cmp(&a.score));
        articles
    }

    pub fn score(&self, article: &Article, sources: Option<&SourceMap>, now: DateTime<Utc>) -> f64 {
        self.recency_score(article.published_at, now)
            * source_weight(article, sources)
            * keyword_boost(article)
    }

    /// `2^(-age / half_life)` clamped to [0, 1]; future timestamps score 1.0
    pub fn recency_score(&self, published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age_hours = (now - published_at).num_milliseconds() as f64 / 3_600_000.0;
        let score = 2f64.powf(-age_hours / self.half_life_hours);
        score.clamp(0.0, 1.0)
    }

    /// First `k` articles of an already ranked list
    pub fn top_k(&self, articles: &[Article], k: usize) -> Vec<Article> {
        articles.iter().take(k).cloned().collect()
    }
}

pub fn source_weight(article: &Article, sources: Option<&SourceMap>) -> f64 {
    let Some(info) = article
        .source_id
        .and_then(|id| sources.and_then(|map| map.get(&id)))
    else {
        return 1.0;
    };

    let source_type = info.source_type.to_lowercase();
    SOURCE_WEIGHTS
        .iter()
        .find(|(key, _)| source_type.contains(key))
        .map(|(_, weight)| *weight)
        .unwrap_or(1.0)
}

/// Highest matching multiplier. Hits do not stack.
pub fn keyword_boost(article: &Article) -> f64 {
    let text = article.keyword_text();
    KEYWORD_BOOSTS
        .iter()
        .filter(|(keyword, _)| text.contains(keyword))
        .map(|(_, boost)| *boost)
        .fold(1.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceInfo;
    use chrono::Duration;

    fn ranker() -> ArticleRanker {
        ArticleRanker::new(36.0)
    }

    fn article(id: i64, title: &str, published_at: DateTime<Utc>) -> Article {
        let mut article = Article::new(None, title, format!("https://example.com/{}", id), published_at);
        article.id = Some(id);
        article
    }

    #[test]
    fn test_recency_score_new_article() {
        let now = Utc::now();
        assert_eq!(ranker().recency_score(now, now), 1.0);
    }

    #[test]
    fn test_recency_score_old_article() {
        let now = Utc::now();
        let score = ranker().recency_score(now - Duration::hours(72), now);
        assert!(score > 0.0 && score < 0.5);
    }

    #[test]
    fn test_recency_score_half_life() {
        let now = Utc::now();
        let score = ranker().recency_score(now - Duration::hours(36), now);
        assert!(score > 0.4 && score < 0.6);
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_recency_score_future_is_clamped() {
        let now = Utc::now();
        assert_eq!(ranker().recency_score(now + Duration::hours(5), now), 1.0);
    }

    #[test]
    fn test_recency_uses_configured_half_life() {
        let now = Utc::now();
        let score = ArticleRanker::new(12.0).recency_score(now - Duration::hours(12), now);
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_keyword_boost() {
        let a = article(1, "Egypt IPO listing on stock exchange", Utc::now())
            .with_summary("Major initial public offering announced");
        assert_eq!(keyword_boost(&a), 1.5);
    }

    #[test]
    fn test_no_keyword_boost() {
        let a = article(1, "Random news story", Utc::now()).with_summary("Some unrelated content");
        assert_eq!(keyword_boost(&a), 1.0);
    }

    #[test]
    fn test_keyword_boost_never_exceeds_table_max() {
        let a = article(
            1,
            "FX budget shipping port logistics suez oil gas IPO listing merger",
            Utc::now(),
        )
        .with_summary("central bank interest rate policy regulation investment acquisition currency");
        assert_eq!(keyword_boost(&a), 1.5);
    }

    #[test]
    fn test_source_weight_lookup() {
        let mut sources = SourceMap::new();
        sources.insert(1, SourceInfo::new("Reuters", "reuters_api"));
        sources.insert(2, SourceInfo::new("Enterprise", "Gmail"));
        sources.insert(3, SourceInfo::new("Ahram", "rss"));
        sources.insert(4, SourceInfo::new("Other", "scraper"));

        let weight = |source_id: Option<i64>| {
            let mut a = article(1, "t", Utc::now());
            a.source_id = source_id;
            source_weight(&a, Some(&sources))
        };

        assert_eq!(weight(Some(1)), 2.0);
        assert_eq!(weight(Some(2)), 1.5);
        assert_eq!(weight(Some(3)), 1.0);
        assert_eq!(weight(Some(4)), 1.0);
        assert_eq!(weight(Some(99)), 1.0);
        assert_eq!(weight(None), 1.0);
    }

    #[test]
    fn test_source_weight_first_table_entry_wins() {
        let mut sources = SourceMap::new();
        sources.insert(1, SourceInfo::new("Enterprise mail", "enterprise_gmail"));
        let mut a = article(1, "t", Utc::now());
        a.source_id = Some(1);
        assert_eq!(source_weight(&a, Some(&sources)), 1.8);
    }

    #[test]
    fn test_source_weight_without_map() {
        let mut a = article(1, "t", Utc::now());
        a.source_id = Some(1);
        assert_eq!(source_weight(&a, None), 1.0);
    }

    #[test]
    fn test_ranking_order() {
        let now = Utc::now();
        let articles = vec![
            article(1, "Old article", now - Duration::hours(48)),
            article(2, "New article with FX keyword", now - Duration::hours(1))
                .with_summary("Foreign exchange rates"),
            article(3, "Medium age article", now - Duration::hours(24)),
        ];

        let ranked = ranker().rank_at(articles, None, now);
        let ids: Vec<_> = ranked.iter().filter_map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert!(ranked.iter().all(|a| a.score >= 0.0));
    }

    #[test]
    fn test_newer_article_scores_at_least_older() {
        let now = Utc::now();
        let r = ranker();
        for hours in [0, 1, 12, 36, 200] {
            let newer = article(1, "Same", now - Duration::hours(hours));
            let older = article(1, "Same", now - Duration::hours(hours + 3));
            assert!(r.score(&newer, None, now) >= r.score(&older, None, now));
        }
    }

    #[test]
    fn test_ties_keep_input_order() {
        let now = Utc::now();
        let articles = vec![
            article(1, "Same", now),
            article(2, "Same", now),
            article(3, "Same", now),
        ];
        let ranked = ranker().rank_at(articles, None, now);
        let ids: Vec<_> = ranked.iter().filter_map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_top_k() {
        let now = Utc::now();
        let articles: Vec<Article> = (0..20)
            .map(|i| article(i, &format!("Article {}", i), now - Duration::hours(i)))
            .collect();
        let ranked = ranker().rank_at(articles, None, now);

        let top = ranker().top_k(&ranked, 5);
        assert_eq!(top.len(), 5);
        assert!(top.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_top_k_larger_than_list() {
        let now = Utc::now();
        let articles = vec![article(1, "a", now), article(2, "b", now)];
        assert_eq!(ranker().top_k(&articles, 10).len(), 2);
        assert!(ranker().top_k(&[], 3).is_empty());
    }
}
