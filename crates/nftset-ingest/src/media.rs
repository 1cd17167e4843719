//! Media retrieval
//!
//! Walks the event table, downloads each event's image and keeps the ones
//! that decode. Retrieval is best effort: every row stands on its own and no
//! row-level failure stops the pass. Failures are sorted into kinds so an
//! unreachable host can be told apart from a corrupt or oversized image.

use crate::error::{IngestError, Result};
use crate::event::{AssetRef, EventTable};
use crate::features::image::{decode, store_extension};
use crate::progress;
use crate::store::ImageStore;
use image::ImageError;
use reqwest::{Client, StatusCode};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Why one image was not retrieved
#[derive(Error, Debug)]
pub enum MediaFailure {
    #[error("asset has no image URL")]
    MissingUrl,

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("server returned {0}")]
    Status(StatusCode),

    #[error("image exceeds decoder limits: {0}")]
    TooLarge(#[source] ImageError),

    #[error("image did not decode: {0}")]
    Decode(#[source] ImageError),

    #[error("could not store image: {0}")]
    Storage(#[source] IngestError),
}

/// Failure categories, for counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    MissingUrl,
    Transport,
    Status,
    TooLarge,
    Decode,
    Storage,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::MissingUrl => "missing_url",
            FailureKind::Transport => "transport",
            FailureKind::Status => "status",
            FailureKind::TooLarge => "too_large",
            FailureKind::Decode => "decode",
            FailureKind::Storage => "storage",
        };
        f.write_str(name)
    }
}

impl MediaFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            MediaFailure::MissingUrl => FailureKind::MissingUrl,
            MediaFailure::Transport(_) => FailureKind::Transport,
            MediaFailure::Status(_) => FailureKind::Status,
            MediaFailure::TooLarge(_) => FailureKind::TooLarge,
            MediaFailure::Decode(_) => FailureKind::Decode,
            MediaFailure::Storage(_) => FailureKind::Storage,
        }
    }

    fn from_image(error: ImageError) -> Self {
        match error {
            ImageError::Limits(_) => MediaFailure::TooLarge(error),
            other => MediaFailure::Decode(other),
        }
    }
}

/// Counters reported after a retrieval pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalSummary {
    pub rows_read: usize,

    /// Rows whose asset JSON parsed
    pub rows_parsed: usize,

    /// Rows skipped because the row or its asset JSON could not be read
    pub malformed: usize,

    /// Images downloaded, decoded and stored
    pub retrieved: usize,

    pub failures: BTreeMap<FailureKind, usize>,
}

impl RetrievalSummary {
    pub fn failures_of(&self, kind: FailureKind) -> usize {
        self.failures.get(&kind).copied().unwrap_or(0)
    }
}

/// Downloads images into an [`ImageStore`]
pub struct MediaRetriever<'a> {
    client: &'a Client,
    store: &'a ImageStore,
}

impl<'a> MediaRetriever<'a> {
    pub fn new(client: &'a Client, store: &'a ImageStore) -> Self {
        Self { client, store }
    }

    /// Fetch, decode and store one asset's image
    pub async fn retrieve(&self, asset: &AssetRef) -> std::result::Result<PathBuf, MediaFailure> {
        let url = asset
            .image_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(MediaFailure::MissingUrl)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(MediaFailure::Transport)?;

        if !response.status().is_success() {
            return Err(MediaFailure::Status(response.status()));
        }

        let bytes = response.bytes().await.map_err(MediaFailure::Transport)?;
        let (_, format) = decode(&bytes).map_err(MediaFailure::from_image)?;

        self.store
            .save(&asset.id, &store_extension(format), &bytes)
            .map_err(MediaFailure::Storage)
    }

    /// Retrieve the image of every row of the event table at `events`
    #[instrument(skip(self))]
    pub async fn retrieve_all(&self, events: &Path) -> Result<RetrievalSummary> {
        let table = EventTable::open(events)?;
        let mut summary = RetrievalSummary::default();
        let spinner = progress::spinner("Downloading NFT files");

        for line in table {
            summary.rows_read += 1;

            let asset = match line.row.map_err(|e| e.to_string()).and_then(|row| {
                row.asset().map_err(|e| e.to_string())
            }) {
                Ok(asset) => asset,
                Err(e) => {
                    warn!(line = line.line, error = %e, "JSON decode error");
                    summary.malformed += 1;
                    continue;
                },
            };
            summary.rows_parsed += 1;

            match self.retrieve(&asset).await {
                Ok(path) => {
                    summary.retrieved += 1;
                    debug!(asset_id = %asset.id, path = %path.display(), "Stored image");
                },
                Err(failure) => {
                    debug!(asset_id = %asset.id, kind = %failure.kind(), error = %failure, "Image not retrieved");
                    *summary.failures.entry(failure.kind()).or_default() += 1;
                },
            }

            spinner.set_message(format!("Loaded {} NFTs", summary.retrieved));
        }

        spinner.finish_and_clear();
        info!(
            retrieved = summary.retrieved,
            parsed = summary.rows_parsed,
            "Loaded {} NFTs",
            summary.retrieved
        );

        Ok(summary)
    }
}

/// Download the images referenced by the event table at `events`
pub async fn retrieve_media(
    client: &Client,
    events: &Path,
    store: &ImageStore,
) -> Result<RetrievalSummary> {
    MediaRetriever::new(client, store).retrieve_all(events).await
}
