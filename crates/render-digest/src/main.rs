use anyhow::{Context, Result};
use clap::Parser;
use shared::{list_digest_files, load_digest, Config, DigestRecord, DigestRenderer};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "render-digest")]
#[command(about = "Re-render a saved digest to HTML and Markdown")]
struct Args {
    /// Path to the digest JSON file (if not provided, will list saved digests)
    #[arg(short, long)]
    file: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("shared=warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let digest_file = if let Some(path) = args.file {
        path
    } else {
        select_digest_file(&config.data_dir.join("digests"))?
    };

    println!("📖 Reading digest: {}", digest_file.display());
    let record = load_digest(&digest_file)?;

    let bullets: usize = record.sections.values().map(Vec::len).sum();
    println!(
        "✓ Loaded digest for {} with {} sections and {} bullets",
        record.date,
        record.sections.len(),
        bullets
    );

    println!("\n📝 Rendering HTML and Markdown...");
    let renderer = DigestRenderer::new(&config.output_dir, config.digest_timezone()?);
    let paths = renderer
        .render(&record.summary(), &record.date)
        .context("Failed to render digest")?;

    println!("✓ HTML saved to: {}", paths.html_path.display());
    println!("✓ Markdown saved to: {}", paths.md_path.display());

    println!("\n✅ Done!");

    Ok(())
}

fn select_digest_file(digests_dir: &Path) -> Result<PathBuf> {
    let digests = list_digest_files(digests_dir)?;

    if digests.is_empty() {
        anyhow::bail!("No saved digests found in {}", digests_dir.display());
    }

    println!("Available digests:\n");
    for (i, (_, record)) in digests.iter().enumerate() {
        println!("  {}) {}", i + 1, describe(record));
    }

    print!("\nSelect digest (1-{}): ", digests.len());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let selection: usize = input
        .trim()
        .parse()
        .context("Invalid selection. Please enter a number.")?;

    if selection < 1 || selection > digests.len() {
        anyhow::bail!("Selection out of range. Please choose 1-{}", digests.len());
    }

    Ok(digests[selection - 1].0.clone())
}

fn describe(record: &DigestRecord) -> String {
    let created = chrono::DateTime::parse_from_rfc3339(&record.created_at)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!(
        "{} ({} stories, created: {})",
        record.date,
        record.items.len(),
        created
    )
}
