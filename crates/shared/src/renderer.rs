use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::summarizer::DigestSummary;

// Render order for known section keys. Anything else follows alphabetically.
const SECTION_ORDER: &[(&str, &str)] = &[
    ("EGYPT", "Egypt"),
    ("KSA", "Saudi Arabia"),
    ("UAE", "UAE"),
    ("MENA", "MENA"),
    ("OTHER", "Other"),
    ("LOGISTICS_SHIPPING", "Logistics & Shipping"),
    ("POLICY_REGULATION", "Policy & Regulation"),
    ("GENERAL", "General"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPaths {
    pub html_path: PathBuf,
    pub md_path: PathBuf,
}

/// Writes a digest as `digest.html` and `digest.md` under `<output_dir>/<date>/`
pub struct DigestRenderer {
    output_dir: PathBuf,
    timezone: FixedOffset,
}

impl DigestRenderer {
    pub fn new(output_dir: impl Into<PathBuf>, timezone: FixedOffset) -> Self {
        Self {
            output_dir: output_dir.into(),
            timezone,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn render(&self, summary: &DigestSummary, date: &str) -> Result<RenderedPaths> {
        let generated_at = self.generated_at(Utc::now());

        let dir = self.output_dir.join(date);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        let md_path = dir.join("digest.md");
        fs::write(&md_path, Self::generate_markdown(summary, date, &generated_at))
            .context("Failed to write Markdown digest")?;

        let html_path = dir.join("digest.html");
        fs::write(&html_path, Self::generate_html(summary, date, &generated_at))
            .context("Failed to write HTML digest")?;

        Ok(RenderedPaths { html_path, md_path })
    }

    fn generated_at(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.timezone)
            .format("%Y-%m-%d %H:%M UTC%:z")
            .to_string()
    }

    pub fn generate_html(summary: &DigestSummary, date: &str, generated_at: &str) -> String {
        let mut html = String::new();

        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        html.push_str("  <meta charset=\"UTF-8\">\n");
        html.push_str(&format!(
            "  <title>MENA Daily Digest - {}</title>\n",
            Self::escape_html(date)
        ));
        html.push_str("  <style>\n");
        html.push_str("    body { font-family: Arial, sans-serif; max-width: 760px; margin: 40px auto; padding: 0 20px; line-height: 1.6; }\n");
        html.push_str("    h1 { color: #2c3e50; border-bottom: 3px solid #16a085; padding-bottom: 10px; }\n");
        html.push_str("    h2 { color: #34495e; margin-top: 30px; padding: 8px 10px; background-color: #ecf0f1; border-left: 4px solid #16a085; }\n");
        html.push_str("    .tldr { background-color: #f8f9fa; padding: 12px 16px; border-radius: 4px; }\n");
        html.push_str("    .link { color: #2980b9; text-decoration: none; }\n");
        html.push_str("    .link:hover { text-decoration: underline; }\n");
        html.push_str("    li { margin: 8px 0; }\n");
        html.push_str("    .generated { color: #7f8c8d; font-size: 0.85em; margin-top: 40px; }\n");
        html.push_str("  </style>\n");
        html.push_str("</head>\n<body>\n");

        html.push_str(&format!(
            "<h1>MENA Daily Digest<br><small>{}</small></h1>\n",
            Self::escape_html(date)
        ));

        html.push_str("<h2>TL;DR</h2>\n");
        html.push_str(&format!(
            "<p class=\"tldr\">{}</p>\n",
            Self::escape_html(&summary.tl_dr)
        ));

        for (key, bullets) in ordered_sections(summary) {
            html.push_str(&format!(
                "<h2>{}</h2>\n<ul>\n",
                Self::escape_html(&section_label(key))
            ));
            for bullet in bullets {
                let (text, link) = split_link(bullet);
                match link {
                    Some(url) => html.push_str(&format!(
                        "  <li>{} (<a href=\"{}\" class=\"link\" target=\"_blank\">link</a>)</li>\n",
                        Self::escape_html(text),
                        Self::escape_html(url)
                    )),
                    None => html.push_str(&format!("  <li>{}</li>\n", Self::escape_html(bullet))),
                }
            }
            html.push_str("</ul>\n");
        }

        html.push_str(&format!(
            "<p class=\"generated\">Generated at {}</p>\n",
            Self::escape_html(generated_at)
        ));
        html.push_str("</body>\n</html>");
        html
    }

    pub fn generate_markdown(summary: &DigestSummary, date: &str, generated_at: &str) -> String {
        let mut md = String::new();

        md.push_str(&format!("# MENA Daily Digest - {}\n\n", date));
        md.push_str("## TL;DR\n\n");
        md.push_str(&format!("{}\n\n", summary.tl_dr));

        for (key, bullets) in ordered_sections(summary) {
            md.push_str(&format!("## {}\n\n", section_label(key)));
            for bullet in bullets {
                md.push_str(&format!("- {}\n", bullet));
            }
            md.push('\n');
        }

        md.push_str("---\n\n");
        md.push_str(&format!("_Generated at {}_\n", generated_at));
        md
    }

    fn escape_html(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#39;")
    }
}

/// Human heading for a section key, e.g. `LOGISTICS_SHIPPING` -> `Logistics & Shipping`
pub fn section_label(key: &str) -> String {
    if let Some((_, label)) = SECTION_ORDER.iter().find(|(k, _)| *k == key) {
        return label.to_string();
    }

    key.split(['_', '/'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Non-empty sections in render order
fn ordered_sections(summary: &DigestSummary) -> Vec<(&str, &Vec<String>)> {
    let rank = |key: &str| {
        SECTION_ORDER
            .iter()
            .position(|(k, _)| *k == key)
            .unwrap_or(SECTION_ORDER.len())
    };

    // BTreeMap iteration is already alphabetical, so a stable sort by rank
    // leaves unknown keys in alphabetical order
    let mut sections: Vec<(&str, &Vec<String>)> = summary
        .sections
        .iter()
        .filter(|(_, bullets)| !bullets.is_empty())
        .map(|(key, bullets)| (key.as_str(), bullets))
        .collect();
    sections.sort_by_key(|(key, _)| rank(*key));
    sections
}

/// Split a `"headline (https://...)"` bullet into its text and link
fn split_link(bullet: &str) -> (&str, Option<&str>) {
    let trimmed = bullet.trim_end();
    if let Some(inner) = trimmed.strip_suffix(')') {
        if let Some(open) = inner.rfind(" (") {
            let url = &inner[open + 2..];
            if url.starts_with("http://") || url.starts_with("https://") {
                return (&inner[..open], Some(url));
            }
        }
    }
    (bullet, None)
}
