use crate::models::{Article, RegionTag, SectionTag};

// Table order is the tie-break order: on equal scores the earlier tag wins.
const REGION_KEYWORDS: &[(RegionTag, &[&str])] = &[
    (
        RegionTag::Egypt,
        &[
            "egypt",
            "egyptian",
            "cairo",
            "suez",
            "alexandria",
            "nile",
            "pharaoh",
            "cbe",
            "central bank of egypt",
        ],
    ),
    (
        RegionTag::Ksa,
        &[
            "saudi",
            "arabia",
            "riyadh",
            "jeddah",
            "mecca",
            "kingdom",
            "ksa",
            "saudi aramco",
            "neom",
        ],
    ),
    (
        RegionTag::Uae,
        &[
            "uae",
            "dubai",
            "abu dhabi",
            "emirates",
            "emirati",
            "sharjah",
            "dp world",
        ],
    ),
    (
        RegionTag::Mena,
        &[
            "middle east",
            "north africa",
            "mena",
            "gulf",
            "gcc",
            "arab",
            "levant",
        ],
    ),
];

const SECTION_KEYWORDS: &[(SectionTag, &[&str])] = &[
    (
        SectionTag::LogisticsShipping,
        &[
            "shipping",
            "logistics",
            "port",
            "cargo",
            "freight",
            "maritime",
            "vessel",
            "container",
            "suez canal",
            "supply chain",
            "warehouse",
            "transport",
            "delivery",
        ],
    ),
    (
        SectionTag::PolicyRegulation,
        &[
            "policy",
            "regulation",
            "law",
            "government",
            "ministry",
            "parliament",
            "legislation",
            "compliance",
            "tax",
            "subsidy",
            "reform",
            "central bank",
            "monetary",
            "fiscal",
        ],
    ),
];

/// Assigns region and section tags by keyword scoring
#[derive(Debug, Default, Clone, Copy)]
pub struct ArticleClassifier;

impl ArticleClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Tags for the given title and summary. Pure: same input, same tags.
    pub fn classify_text(&self, title: &str, summary: Option<&str>) -> (RegionTag, SectionTag) {
        let text = format!("{} {}", title, summary.unwrap_or("")).to_lowercase();
        (
            best_tag(REGION_KEYWORDS, &text).unwrap_or(RegionTag::Mena),
            best_tag(SECTION_KEYWORDS, &text).unwrap_or(SectionTag::General),
        )
    }

    pub fn classify(&self, mut article: Article) -> Article {
        let (region, section) = self.classify_text(&article.title, article.summary_raw.as_deref());
        article.region_tag = region;
        article.section_tag = section;
        article
    }

    pub fn classify_batch(&self, articles: Vec<Article>) -> Vec<Article> {
        articles.into_iter().map(|a| self.classify(a)).collect()
    }
}

/// Highest scoring tag, first in table order on ties. `None` when nothing matched.
fn best_tag<T: Copy>(table: &[(T, &[&str])], text: &str) -> Option<T> {
    let mut best: Option<(T, usize)> = None;

    for (tag, keywords) in table {
        let score = keywords.iter().filter(|k| text.contains(*k)).count();
        if score == 0 {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((*tag, score)),
        }
    }

    best.map(|(tag, _)| tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn article(title: &str, summary: &str) -> Article {
        Article::new(None, title, "https://example.com/article", Utc::now()).with_summary(summary)
    }

    #[test]
    fn test_classify_egypt() {
        let result = ArticleClassifier::new().classify(article(
            "Egypt's Central Bank raises interest rates",
            "The Central Bank of Egypt announced new monetary policy",
        ));
        assert_eq!(result.region_tag, RegionTag::Egypt);
    }

    #[test]
    fn test_classify_ksa() {
        let result = ArticleClassifier::new().classify(article(
            "Saudi Arabia launches NEOM project expansion",
            "Saudi Aramco invests in new infrastructure in Riyadh",
        ));
        assert_eq!(result.region_tag, RegionTag::Ksa);
    }

    #[test]
    fn test_classify_uae() {
        let result = ArticleClassifier::new().classify(article(
            "Dubai launches new logistics hub",
            "DP World expands operations in Abu Dhabi",
        ));
        assert_eq!(result.region_tag, RegionTag::Uae);
    }

    #[test]
    fn test_classify_logistics() {
        let result = ArticleClassifier::new().classify(article(
            "Suez Canal sees record cargo volumes",
            "Shipping traffic through the canal increased with new container vessels",
        ));
        assert_eq!(result.section_tag, SectionTag::LogisticsShipping);
    }

    #[test]
    fn test_classify_policy() {
        let result = ArticleClassifier::new().classify(article(
            "New tax reform legislation passed",
            "Government introduces fiscal policy changes and new regulations",
        ));
        assert_eq!(result.section_tag, SectionTag::PolicyRegulation);
    }

    #[test]
    fn test_classify_general_default() {
        let result = ArticleClassifier::new().classify(article(
            "Tech startup raises funding",
            "A new technology company secured investment",
        ));
        assert_eq!(result.section_tag, SectionTag::General);
    }

    #[test]
    fn test_no_matches_fall_back_to_defaults() {
        let tags = ArticleClassifier::new().classify_text("Quiet day", None);
        assert_eq!(tags, (RegionTag::Mena, SectionTag::General));
    }

    #[test]
    fn test_generic_keywords_score_mena() {
        let tags = ArticleClassifier::new().classify_text("GCC leaders meet", Some("Gulf summit"));
        assert_eq!(tags.0, RegionTag::Mena);
    }

    #[test]
    fn test_tie_goes_to_first_table_entry() {
        // one Egypt keyword, one UAE keyword
        let tags = ArticleClassifier::new().classify_text("Cairo and Dubai", None);
        assert_eq!(tags.0, RegionTag::Egypt);

        // one logistics keyword, one policy keyword
        let tags = ArticleClassifier::new().classify_text("Freight tax", None);
        assert_eq!(tags.1, SectionTag::LogisticsShipping);
    }

    #[test]
    fn test_substring_match_without_word_boundaries() {
        // "transport" inside "transportation"
        let tags = ArticleClassifier::new().classify_text("Transportation costs", None);
        assert_eq!(tags.1, SectionTag::LogisticsShipping);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let classifier = ArticleClassifier::new();
        let inputs = [
            ("Egypt port expansion", Some("Suez canal cargo")),
            ("Riyadh ministry", None),
            ("", Some("")),
        ];
        for (title, summary) in inputs {
            assert_eq!(
                classifier.classify_text(title, summary),
                classifier.classify_text(title, summary)
            );
        }
    }

    #[test]
    fn test_classify_batch_preserves_order() {
        let classifier = ArticleClassifier::new();
        let batch = vec![article("Dubai", ""), article("Cairo", "")];
        let result = classifier.classify_batch(batch);
        assert_eq!(result[0].region_tag, RegionTag::Uae);
        assert_eq!(result[1].region_tag, RegionTag::Egypt);
    }
}
