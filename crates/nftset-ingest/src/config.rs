//! Pipeline configuration
//!
//! Endpoint, credential, record budgets and file locations. Everything is
//! read from the environment (a `.env` file is honoured) and can be
//! overridden from the command line.

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Default marketplace API base URL.
pub const DEFAULT_API_URL: &str = "https://api.opensea.io/api/v1/";

/// Default HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default record budget for the events crawl.
pub const DEFAULT_MAX_EVENTS: usize = 1000;

/// Default record budget for the assets crawl.
pub const DEFAULT_MAX_ASSETS: usize = 1000;

pub const DEFAULT_EVENTS_FILE: &str = "events.csv";
pub const DEFAULT_ASSETS_FILE: &str = "assets.csv";
pub const DEFAULT_DATASET_FILE: &str = "training.csv";
pub const DEFAULT_ASSETS_DIR: &str = "assets";

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// API base URL; endpoint paths are joined onto it
    pub api_url: String,

    /// Static API key sent as `X-API-KEY`
    pub api_key: String,

    /// HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Approximate cap on event records to crawl
    pub max_events: usize,

    /// Approximate cap on asset records to crawl
    pub max_assets: usize,

    pub events_file: PathBuf,
    pub assets_file: PathBuf,
    pub dataset_file: PathBuf,

    /// Image store directory
    pub assets_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_events: DEFAULT_MAX_EVENTS,
            max_assets: DEFAULT_MAX_ASSETS,
            events_file: PathBuf::from(DEFAULT_EVENTS_FILE),
            assets_file: PathBuf::from(DEFAULT_ASSETS_FILE),
            dataset_file: PathBuf::from(DEFAULT_DATASET_FILE),
            assets_dir: PathBuf::from(DEFAULT_ASSETS_DIR),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

impl PipelineConfig {
    /// Load configuration from environment and defaults
    ///
    /// - `OPENSEA_URL`, `OPENSEA_API_KEY`
    /// - `NFTSET_TIMEOUT_SECS`, `NFTSET_MAX_EVENTS`, `NFTSET_MAX_ASSETS`
    /// - `NFTSET_EVENTS_FILE`, `NFTSET_ASSETS_FILE`, `NFTSET_DATASET_FILE`,
    ///   `NFTSET_ASSETS_DIR`
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Self {
            api_url: std::env::var("OPENSEA_URL").unwrap_or(defaults.api_url),
            api_key: std::env::var("OPENSEA_API_KEY").unwrap_or(defaults.api_key),
            timeout_secs: env_parse("NFTSET_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            max_events: env_parse("NFTSET_MAX_EVENTS").unwrap_or(defaults.max_events),
            max_assets: env_parse("NFTSET_MAX_ASSETS").unwrap_or(defaults.max_assets),
            events_file: env_parse("NFTSET_EVENTS_FILE").unwrap_or(defaults.events_file),
            assets_file: env_parse("NFTSET_ASSETS_FILE").unwrap_or(defaults.assets_file),
            dataset_file: env_parse("NFTSET_DATASET_FILE").unwrap_or(defaults.dataset_file),
            assets_dir: env_parse("NFTSET_ASSETS_DIR").unwrap_or(defaults.assets_dir),
        }
    }

    /// Validate settings needed by every stage
    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            return Err(IngestError::config("API base URL cannot be empty"));
        }

        if self.timeout_secs == 0 {
            return Err(IngestError::config("Timeout must be greater than 0"));
        }

        self.base_url()?;
        Ok(())
    }

    /// Validate settings needed by the crawl stages
    pub fn validate_for_crawl(&self) -> Result<()> {
        self.validate()?;

        if self.api_key.trim().is_empty() {
            return Err(IngestError::config(
                "API key is required for crawling; set OPENSEA_API_KEY",
            ));
        }

        Ok(())
    }

    /// Parsed base URL, with a trailing slash so endpoints join beneath it
    pub fn base_url(&self) -> Result<Url> {
        let mut base = self.api_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Url::parse(&base)?)
    }
}
