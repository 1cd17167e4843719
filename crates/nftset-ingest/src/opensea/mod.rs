//! Marketplace API crawling
//!
//! - [`fetcher`]: cursor-driven paging over a single endpoint
//! - [`crawler`]: known endpoints drained into CSV tables

pub mod crawler;
pub mod fetcher;

pub use crawler::{crawl, CrawlPlan, CrawlSummary};
pub use fetcher::{ApiClient, Direction, FetchError, FetchRequest, Page};
