//! NFTSet - NFT sale dataset builder

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use nftset_common::logging::{init_logging, LogConfig, LogLevel};
use nftset_ingest::config::PipelineConfig;
use nftset_ingest::features::assemble_dataset;
use nftset_ingest::media::retrieve_media;
use nftset_ingest::opensea::{crawl, ApiClient, CrawlPlan};
use nftset_ingest::store::ImageStore;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "nftset")]
#[command(author, version, about = "Build an image-feature dataset from NFT sale events")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    overrides: Overrides,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Command-line overrides for the environment configuration
#[derive(Args, Debug)]
struct Overrides {
    /// API base URL
    #[arg(long, global = true, env = "OPENSEA_URL")]
    api_url: Option<String>,

    /// API key sent as X-API-KEY
    #[arg(long, global = true, env = "OPENSEA_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Event table path
    #[arg(long, global = true)]
    events_file: Option<PathBuf>,

    /// Image store directory
    #[arg(long, global = true)]
    assets_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl successful sale events into the event table
    Events {
        /// Approximate number of events to fetch
        #[arg(short, long)]
        max: Option<usize>,
    },

    /// Crawl the asset listing into the assets table
    Assets {
        /// Approximate number of assets to fetch
        #[arg(short, long)]
        max: Option<usize>,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download the images referenced by the event table
    Media,

    /// Build the dataset table from the event table and stored images
    Dataset {
        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Crawl events, download media and build the dataset
    All {
        /// Approximate number of events to fetch
        #[arg(short, long)]
        max: Option<usize>,
    },
}

impl Overrides {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(url) = self.api_url {
            config.api_url = url;
        }
        if let Some(key) = self.api_key {
            config.api_key = key;
        }
        if let Some(path) = self.events_file {
            config.events_file = path;
        }
        if let Some(dir) = self.assets_dir {
            config.assets_dir = dir;
        }
    }
}

async fn crawl_events(config: &PipelineConfig) -> Result<()> {
    config.validate_for_crawl()?;
    let client = ApiClient::from_config(config)?;
    info!("Querying events...");
    crawl(&client, &CrawlPlan::events(config.max_events), &config.events_file).await?;
    Ok(())
}

async fn download_media(config: &PipelineConfig) -> Result<()> {
    config.validate()?;
    let client = ApiClient::from_config(config)?;
    let store = ImageStore::create(&config.assets_dir)?;
    info!("Downloading NFT files...");
    let summary = retrieve_media(client.http(), &config.events_file, &store).await?;
    for (kind, count) in &summary.failures {
        info!(kind = %kind, count, "Images not retrieved");
    }
    Ok(())
}

fn build_dataset(config: &PipelineConfig) -> Result<()> {
    let store = ImageStore::new(&config.assets_dir);
    info!("Preparing NFT dataset...");
    assemble_dataset(&config.events_file, &store, &config.dataset_file)?;
    Ok(())
}

/// Logging settings from the environment; `--verbose` wins over
/// `NFTSET_LOG_LEVEL`
fn log_config(verbose: bool) -> Result<LogConfig> {
    let mut config = LogConfig::builder()
        .level(LogLevel::Info)
        .log_file_prefix("nftset")
        .filter_directives("hyper=warn,reqwest=warn")
        .build()
        .merge_env()?;

    if verbose {
        config.level = LogLevel::Debug;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = log_config(cli.verbose)?;
    let _guard = init_logging(&log_config)?;

    let mut config = PipelineConfig::from_env();
    cli.overrides.apply(&mut config);

    match cli.command {
        Command::Events { max } => {
            if let Some(max) = max {
                config.max_events = max;
            }
            crawl_events(&config).await?;
        },
        Command::Assets { max, output } => {
            if let Some(max) = max {
                config.max_assets = max;
            }
            if let Some(output) = output {
                config.assets_file = output;
            }
            config.validate_for_crawl()?;
            let client = ApiClient::from_config(&config)?;
            info!("Querying assets...");
            crawl(&client, &CrawlPlan::assets(config.max_assets), &config.assets_file).await?;
        },
        Command::Media => {
            download_media(&config).await?;
        },
        Command::Dataset { output } => {
            if let Some(output) = output {
                config.dataset_file = output;
            }
            build_dataset(&config)?;
        },
        Command::All { max } => {
            if let Some(max) = max {
                config.max_events = max;
            }
            crawl_events(&config).await?;
            download_media(&config).await?;
            build_dataset(&config)?;
        },
    }

    info!("Done");
    Ok(())
}
