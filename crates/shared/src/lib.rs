// Public modules
pub mod canonical;
pub mod config;
pub mod delivery;
pub mod error;
pub mod ingestors;
pub mod models;
pub mod pipeline;
pub mod processors;
pub mod renderer;
pub mod store;
pub mod summarizer;

// Re-export commonly used types
pub use canonical::{CanonicalResolver, HttpCanonicalResolver};
pub use config::Config;
pub use delivery::{ConsoleDelivery, Deliverer, DeliveryPayload};
pub use error::DigestError;
pub use ingestors::Ingestor;
pub use models::{Article, DigestRecord, RegionTag, SectionTag, SourceDefinition, SourceMap};
pub use pipeline::{DigestOutcome, DigestPipeline};
pub use processors::{ArticleClassifier, ArticleDeduplicator, ArticleNormalizer, ArticleRanker};
pub use renderer::DigestRenderer;
pub use store::{list_digest_files, load_digest, load_sources, DigestStore, JsonStore};
pub use summarizer::{DigestSummarizer, DigestSummary};
