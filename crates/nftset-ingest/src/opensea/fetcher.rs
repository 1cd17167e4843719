//! Cursor-driven page fetcher
//!
//! Issues successive GET requests against one endpoint, following the
//! cursor the server returns, and yields each decoded page lazily. The crawl
//! stops after a failed request, once the record budget is used up, or when
//! the server stops handing out cursors.

use crate::config::PipelineConfig;
use crate::error::Result;
use futures::stream::{self, Stream};
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Which cursor field of a page to follow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Next => "next",
            Direction::Previous => "previous",
        }
    }
}

/// One paged crawl of an endpoint
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Endpoint path joined onto the API base URL
    pub endpoint: String,

    /// Fixed query parameters sent with every request
    pub query: Vec<(String, String)>,

    /// Name of the response field holding the page's records
    pub list_field: String,

    /// Approximate cap on records; the last page may overshoot it
    pub budget: usize,

    pub direction: Direction,
}

/// A decoded response page
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<Value>,

    /// Cursor for the following request, `None` when pagination is over
    pub cursor: Option<String>,
}

impl Page {
    /// Pull the record list and the cursor out of a response body. A missing
    /// list field reads as an empty page.
    pub fn from_body(mut body: Value, list_field: &str, direction: Direction) -> Self {
        let records = match body.get_mut(list_field).map(Value::take) {
            Some(Value::Array(records)) => records,
            _ => Vec::new(),
        };

        let cursor = match body.get(direction.as_str()) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };

        Self { records, cursor }
    }
}

/// Why a page request ended the crawl
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("server returned {0}")]
    Status(StatusCode),

    #[error("response body is not valid JSON: {0}")]
    Body(#[source] reqwest::Error),
}

/// HTTP client for the marketplace API
pub struct ApiClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

struct CrawlState {
    remaining: i64,
    cursor: Option<String>,
    done: bool,
}

impl ApiClient {
    pub fn new(base_url: Url, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nftset/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(
            config.base_url()?,
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Plain client for fetching media, shared with the API connection pool
    pub fn http(&self) -> &Client {
        &self.client
    }

    async fn get_page(
        &self,
        url: &Url,
        query: &[(String, String)],
        cursor: Option<&str>,
    ) -> std::result::Result<Value, FetchError> {
        let mut builder = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "application/json")
            .header("X-API-KEY", &self.api_key)
            .query(query);

        if let Some(cursor) = cursor {
            builder = builder.query(&[("cursor", cursor)]);
        }

        let response = builder.send().await.map_err(FetchError::Transport)?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        response.json::<Value>().await.map_err(FetchError::Body)
    }

    /// Lazily crawl `request.endpoint`, yielding one page per request.
    pub fn pages<'a>(&'a self, request: &'a FetchRequest) -> Result<impl Stream<Item = Page> + 'a> {
        let url = self.base_url.join(request.endpoint.trim_start_matches('/'))?;

        let state = CrawlState {
            remaining: i64::try_from(request.budget).unwrap_or(i64::MAX),
            cursor: None,
            done: false,
        };

        Ok(stream::unfold(state, move |mut state| {
            let url = url.clone();
            async move {
                if state.done {
                    return None;
                }

                let body = match self
                    .get_page(&url, &request.query, state.cursor.as_deref())
                    .await
                {
                    Ok(body) => body,
                    Err(e) => {
                        warn!(endpoint = %request.endpoint, error = %e, "Page request failed, ending crawl");
                        return None;
                    },
                };

                let page = Page::from_body(body, &request.list_field, request.direction);

                state.remaining -= page.records.len() as i64;
                state.cursor = page.cursor.clone();
                state.done = state.remaining <= 0 || state.cursor.is_none();

                debug!(
                    endpoint = %request.endpoint,
                    records = page.records.len(),
                    remaining = state.remaining,
                    cursor = ?state.cursor,
                    "Fetched page"
                );

                Some((page, state))
            }
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_from_body() {
        let body = json!({
            "asset_events": [{"id": 1}, {"id": 2}],
            "next": "abc",
            "previous": null
        });

        let page = Page::from_body(body.clone(), "asset_events", Direction::Next);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.cursor.as_deref(), Some("abc"));

        let page = Page::from_body(body, "asset_events", Direction::Previous);
        assert_eq!(page.cursor, None);
    }

    #[test]
    fn test_page_missing_list_field_is_empty() {
        let page = Page::from_body(json!({"next": 7}), "assets", Direction::Next);
        assert!(page.records.is_empty());
        assert_eq!(page.cursor.as_deref(), Some("7"));
    }

    #[test]
    fn test_direction_names() {
        assert_eq!(Direction::Next.as_str(), "next");
        assert_eq!(Direction::Previous.as_str(), "previous");
    }
}
