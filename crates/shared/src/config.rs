use anyhow::{Context, Result};
use chrono::FixedOffset;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: Option<String>,
    pub reuters_api_key: Option<String>,
    pub sources_file: PathBuf,
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub half_life_hours: f64,
    pub top_k: usize,
    pub lookback_hours: i64,
    pub utc_offset_hours: i32,
    pub canonicalize_urls: bool,
    pub canonical_timeout: Duration,
    pub normalize_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            reuters_api_key: None,
            sources_file: PathBuf::from("sources.json"),
            data_dir: default_data_dir(),
            output_dir: PathBuf::from("out"),
            half_life_hours: 36.0,
            top_k: 10,
            lookback_hours: 24,
            utc_offset_hours: 2,
            canonicalize_urls: true,
            canonical_timeout: Duration::from_secs(10),
            normalize_concurrency: 10,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        let defaults = Self::default();

        let config = Self {
            anthropic_api_key: optional_var("ANTHROPIC_API_KEY"),
            reuters_api_key: optional_var("REUTERS_API_KEY"),
            sources_file: optional_var("DIGEST_SOURCES_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.sources_file),
            data_dir: optional_var("DIGEST_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            output_dir: optional_var("DIGEST_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            half_life_hours: parse_var("DIGEST_HALF_LIFE_HOURS", defaults.half_life_hours)?,
            top_k: parse_var("DIGEST_TOP_K", defaults.top_k)?,
            lookback_hours: parse_var("DIGEST_LOOKBACK_HOURS", defaults.lookback_hours)?,
            utc_offset_hours: parse_var("DIGEST_UTC_OFFSET_HOURS", defaults.utc_offset_hours)?,
            canonicalize_urls: parse_var("DIGEST_CANONICALIZE_URLS", defaults.canonicalize_urls)?,
            canonical_timeout: Duration::from_secs(parse_var(
                "DIGEST_CANONICAL_TIMEOUT_SECS",
                defaults.canonical_timeout.as_secs(),
            )?),
            normalize_concurrency: parse_var(
                "DIGEST_NORMALIZE_CONCURRENCY",
                defaults.normalize_concurrency,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.half_life_hours.is_finite() && self.half_life_hours > 0.0) {
            anyhow::bail!(
                "DIGEST_HALF_LIFE_HOURS must be a positive number, got {}",
                self.half_life_hours
            );
        }
        if self.normalize_concurrency == 0 {
            anyhow::bail!("DIGEST_NORMALIZE_CONCURRENCY must be at least 1");
        }
        if self.lookback_hours <= 0 {
            anyhow::bail!("DIGEST_LOOKBACK_HOURS must be positive");
        }
        self.digest_timezone()?;
        Ok(())
    }

    /// Timezone the digest date is computed in
    pub fn digest_timezone(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).with_context(|| {
            format!(
                "DIGEST_UTC_OFFSET_HOURS out of range: {}",
                self.utc_offset_hours
            )
        })
    }

    fn try_load_dotenv() {
        // Try locations in order of preference:

        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/mena-digest/.env (standard config location)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("mena-digest").join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env (home directory)
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }

        // If none found, that's okay - environment variables might be set system-wide
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mena-digest")
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {}", name, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.half_life_hours, 36.0);
        assert_eq!(config.top_k, 10);
    }

    #[test]
    fn test_rejects_non_positive_half_life() {
        let config = Config {
            half_life_hours: 0.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_offset() {
        let config = Config {
            utc_offset_hours: 30,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_var_reports_variable_name() {
        env::set_var("DIGEST_TEST_BAD_NUMBER", "ten");
        let err = parse_var::<usize>("DIGEST_TEST_BAD_NUMBER", 10).unwrap_err();
        assert!(err.to_string().contains("DIGEST_TEST_BAD_NUMBER"));
        env::remove_var("DIGEST_TEST_BAD_NUMBER");
    }

    #[test]
    fn test_parse_var_uses_default_when_unset() {
        assert_eq!(parse_var::<usize>("DIGEST_TEST_UNSET_VAR", 7).unwrap(), 7);
    }
}
