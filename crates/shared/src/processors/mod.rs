// Article processing stages, run in this order over a batch
pub mod normalizer;
pub mod classifier;
pub mod deduplicator;
pub mod ranker;

pub use classifier::ArticleClassifier;
pub use deduplicator::ArticleDeduplicator;
pub use normalizer::ArticleNormalizer;
pub use ranker::ArticleRanker;
