use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use shared::{load_sources, Config, ConsoleDelivery, Deliverer, DigestPipeline, JsonStore};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "build-digest")]
#[command(about = "Fetch, rank and summarize MENA news into a daily digest")]
struct Args {
    /// Digest date (YYYY-MM-DD). Defaults to today in the digest timezone
    #[arg(short, long)]
    date: Option<NaiveDate>,

    /// Number of top stories to summarize
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Hours to look back for articles
    #[arg(long)]
    hours: Option<i64>,

    /// Path to the sources JSON file
    #[arg(short, long)]
    sources: Option<PathBuf>,

    /// Skip canonical URL lookups
    #[arg(long)]
    no_canonical: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("shared=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;

    if let Some(top_k) = args.top_k {
        config.top_k = top_k;
    }
    if let Some(hours) = args.hours {
        config.lookback_hours = hours;
    }
    if let Some(sources) = args.sources {
        config.sources_file = sources;
    }
    if args.no_canonical {
        config.canonicalize_urls = false;
    }
    config.validate()?;

    println!("\n📚 Loading sources from {}...", config.sources_file.display());
    let sources = load_sources(&config.sources_file)?;
    let active = sources.iter().filter(|s| s.is_active).count();
    println!("✓ Found {} sources ({} active)", sources.len(), active);

    let store = JsonStore::open(&config.data_dir, sources.clone())
        .context("Failed to open digest store")?;
    let deliverers: Vec<Box<dyn Deliverer>> = vec![Box::new(ConsoleDelivery)];

    let mut pipeline = DigestPipeline::new(&config, &sources, Box::new(store), deliverers)?;
    info!(
        sources = pipeline.source_count(),
        top_k = config.top_k,
        hours = config.lookback_hours,
        canonical = config.canonicalize_urls,
        "Pipeline ready"
    );

    if config.anthropic_api_key.is_none() {
        println!("⚠ ANTHROPIC_API_KEY not set, using extractive summary");
    }

    println!("\n🌐 Fetching and processing articles...");
    println!("  (This may take a minute...)");
    let outcome = pipeline.run(args.date).await.context("Digest run failed")?;

    println!(
        "✓ Fetched {} articles, {} after deduplication",
        outcome.fetched, outcome.unique
    );
    println!("✓ Selected {} top stories", outcome.record.items.len());

    let preview: String = outcome.record.tl_dr.chars().take(100).collect();
    println!("\n🤖 TL;DR: {}", preview);

    println!("\n✅ Digest for {} saved to: {}", outcome.record.date, outcome.digest_path.display());
    println!("   HTML: {}", outcome.paths.html_path.display());
    println!("   Markdown: {}", outcome.paths.md_path.display());

    Ok(())
}
