//! Runtime configuration for the crawler.
//!
//! Values are layered: built-in defaults, then an optional YAML file passed
//! with `--config`, then CLI flags and environment variables.
//!
//! ```yaml
//! base_url: http://mrxwlb.com
//! request_delay_ms: 1500
//! max_attempts: 4
//! news_dir: /srv/xwlb/news
//! ```

use crate::cli::Cli;
use crate::error::FetchError;
use crate::fetch::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Crawler settings. Every field has a default, so a YAML file may set any subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Scheme and host of the transcript site, without a trailing path.
    pub base_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Minimum gap between two outbound requests.
    pub request_delay_ms: u64,
    /// Total attempts per URL for transient failures.
    pub max_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub retry_jitter_ms: u64,
    /// Article fetches in flight per directory batch.
    pub article_concurrency: usize,
    /// Where `YYYYMMDD.md` records and the missing-dates ledger live.
    pub news_dir: PathBuf,
    /// Where run reports and monthly digests are written.
    pub reports_dir: PathBuf,
    /// Local hour after which today's broadcast is expected online.
    pub broadcast_hour: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://mrxwlb.com".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 15,
            request_delay_ms: 1000,
            max_attempts: 3,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 10_000,
            retry_jitter_ms: 250,
            article_concurrency: 1,
            news_dir: PathBuf::from("data/news"),
            reports_dir: PathBuf::from("data/reports"),
            broadcast_hour: 19,
        }
    }
}

impl CrawlerConfig {
    /// Load from a YAML file, or fall back to defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Self, Box<dyn Error>> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path).await?;
        let config = Self::from_yaml(&raw)?;
        info!(path, "Loaded configuration file");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Apply flags (and their environment variables) on top of file values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(base_url) = &cli.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(dir) = &cli.news_dir {
            self.news_dir = PathBuf::from(dir);
        }
        if let Some(dir) = &cli.reports_dir {
            self.reports_dir = PathBuf::from(dir);
        }
        if let Some(delay) = cli.delay_ms {
            self.request_delay_ms = delay;
        }
        if let Some(concurrency) = cli.concurrency {
            self.article_concurrency = concurrency;
        }
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        self.article_concurrency = self.article_concurrency.max(1);
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            max_jitter: Duration::from_millis(self.retry_jitter_ms),
            retryable: FetchError::is_retryable,
        }
    }
}
