//! NFTSet Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Builds an image-feature dataset from marketplace sale events.
//!
//! # Pipeline
//!
//! 1. **Crawl** ([`opensea`]): page through the events endpoint and stream
//!    the records into an event table ([`sink`]).
//! 2. **Retrieve** ([`media`]): download the image each event refers to into
//!    the keyed [`store`].
//! 3. **Assemble** ([`features`]): join events with stored images and write
//!    one row of statistics per event.
//!
//! Stages talk only through the files they leave behind, so each can be run
//! on its own.
//!
//! # Example
//!
//! ```no_run
//! use nftset_ingest::config::PipelineConfig;
//! use nftset_ingest::opensea::{crawl, ApiClient, CrawlPlan};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::from_env();
//!     let client = ApiClient::from_config(&config)?;
//!     crawl(&client, &CrawlPlan::events(config.max_events), &config.events_file).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod features;
pub mod media;
pub mod opensea;
pub mod progress;
pub mod sink;
pub mod store;

pub use error::{IngestError, Result};
