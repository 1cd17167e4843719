//! Dataset assembly
//!
//! Second pass over the event table: join each event with its stored image,
//! compute the statistics bundle, and stream one wide row per event to the
//! dataset table.

use super::dataset::DatasetRow;
use super::image::DecodedImage;
use crate::error::Result;
use crate::event::{EventTable, PaymentToken};
use crate::progress;
use crate::store::{ImageStore, ACCEPTED_FORMATS};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Counters reported after a dataset pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblySummary {
    pub rows_read: usize,

    /// Rows the CSV reader could not decode, or whose asset JSON is malformed
    pub malformed: usize,

    /// Rows whose asset has no stored image in an accepted format
    pub missing_image: usize,

    /// Stored images that failed to open or decode
    pub undecodable: usize,

    /// Rows emitted despite a color mode outside the expected set
    pub unexpected_mode: usize,

    pub emitted: usize,
}

/// Build the dataset table at `output` from the event table at `events`
#[instrument(skip(store))]
pub fn assemble_dataset(
    events: &Path,
    store: &ImageStore,
    output: &Path,
) -> Result<AssemblySummary> {
    let table = EventTable::open(events)?;
    let file = File::create(output)?;
    let (summary, _) = assemble(table, store, file)?;

    info!("Created {} row(s) dataset at {}", summary.emitted, output.display());
    Ok(summary)
}

/// Assemble from any event table into any writer
pub fn assemble<R: Read, W: Write>(
    table: EventTable<R>,
    store: &ImageStore,
    output: W,
) -> Result<(AssemblySummary, W)> {
    let mut writer = csv::Writer::from_writer(output);
    let mut header_written = false;
    let mut summary = AssemblySummary::default();
    let spinner = progress::spinner("Preparing dataset");

    for line in table {
        summary.rows_read += 1;
        spinner.set_message(format!("Event {}", line.line));

        let event = match line.row {
            Ok(event) => event,
            Err(e) => {
                debug!(line = line.line, error = %e, "Unreadable event row");
                summary.malformed += 1;
                continue;
            },
        };

        let asset = match event.asset() {
            Ok(asset) => asset,
            Err(e) => {
                debug!(line = line.line, error = %e, "Malformed asset JSON");
                summary.malformed += 1;
                continue;
            },
        };

        let Some(path) = store.locate(&asset.id, &ACCEPTED_FORMATS) else {
            summary.missing_image += 1;
            continue;
        };

        let image = match DecodedImage::open(&path) {
            Ok(image) => image,
            Err(e) => {
                debug!(asset_id = %asset.id, path = %path.display(), error = %e, "Stored image did not decode");
                summary.undecodable += 1;
                continue;
            },
        };

        let payment = event.payment_token().unwrap_or_else(|e| {
            warn!(line = line.line, asset_id = %asset.id, error = %e, "Malformed payment token, using defaults");
            PaymentToken::default()
        });

        let mode = image.mode();
        if !mode.is_expected() {
            warn!(asset_id = %asset.id, mode = %mode, "Unexpected image mode");
            summary.unexpected_mode += 1;
        }

        let row = DatasetRow::new(&asset, &event, payment, &image);

        if !header_written {
            writer.write_record(row.header())?;
            header_written = true;
        }
        writer.write_record(row.record())?;
        writer.flush()?;
        summary.emitted += 1;
    }

    spinner.finish_and_clear();

    let output = writer
        .into_inner()
        .map_err(|e| crate::error::IngestError::Io(e.into_error()))?;
    Ok((summary, output))
}
