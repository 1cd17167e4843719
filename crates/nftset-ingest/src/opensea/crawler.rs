//! Event crawler: fetch, flatten and write one endpoint into a CSV table

use super::fetcher::{ApiClient, Direction, FetchRequest};
use crate::error::Result;
use crate::sink::{TableSink, REQUIRED_NESTED_FIELD};
use futures::StreamExt;
use std::fs::File;
use std::path::Path;
use tracing::{info, instrument, warn};

/// A known endpoint together with the record shape its table keeps
#[derive(Debug, Clone)]
pub struct CrawlPlan {
    pub request: FetchRequest,

    /// Nested field a record must carry to be written
    pub required_field: Option<String>,
}

impl CrawlPlan {
    /// Successful sale events, newest first, following `next` cursors.
    /// Bundle sales carry no single asset and are left out.
    pub fn events(budget: usize) -> Self {
        Self {
            request: FetchRequest {
                endpoint: "events".to_string(),
                query: vec![("event_type".to_string(), "successful".to_string())],
                list_field: "asset_events".to_string(),
                budget,
                direction: Direction::Next,
            },
            required_field: Some(REQUIRED_NESTED_FIELD.to_string()),
        }
    }

    /// Asset listing in ascending order, following `previous` cursors.
    /// The API returns 20 records per page unless asked for up to 50.
    pub fn assets(budget: usize) -> Self {
        Self {
            request: FetchRequest {
                endpoint: "assets".to_string(),
                query: vec![
                    ("order_direction".to_string(), "asc".to_string()),
                    ("limit".to_string(), "50".to_string()),
                    ("include_orders".to_string(), "false".to_string()),
                ],
                list_field: "assets".to_string(),
                budget,
                direction: Direction::Previous,
            },
            required_field: None,
        }
    }
}

/// Outcome of one crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub pages: usize,

    /// Records received across all pages, kept or not
    pub records_seen: usize,

    pub rows_written: usize,

    /// Kept records dropped because their fields did not match the header
    pub skipped: usize,
}

/// Drain `plan` into a CSV file at `output`, truncating it first.
///
/// A failed request ends the crawl but is not an error: whatever was written
/// before it stays in the file. Neither is a record whose fields differ from
/// the header; it is skipped and counted.
#[instrument(skip(client, plan), fields(endpoint = %plan.request.endpoint))]
pub async fn crawl(client: &ApiClient, plan: &CrawlPlan, output: &Path) -> Result<CrawlSummary> {
    let file = File::create(output)?;
    let mut sink = TableSink::new(file).requiring(plan.required_field.as_deref());
    let mut summary = CrawlSummary::default();

    let pages = client.pages(&plan.request)?;
    futures::pin_mut!(pages);

    while let Some(page) = pages.next().await {
        summary.pages += 1;
        summary.records_seen += page.records.len();
        sink.write_page(&page)?;
    }

    summary.rows_written = sink.rows_written();
    summary.skipped = sink.rows_mismatched();
    sink.into_inner()?;

    if summary.skipped > 0 {
        warn!(skipped = summary.skipped, "Records with an unexpected shape were not written");
    }

    info!(
        "{} {} rows written to {}",
        summary.rows_written,
        plan.request.endpoint,
        output.display()
    );

    Ok(summary)
}
