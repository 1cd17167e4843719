//! Event table decoding
//!
//! Rows of the event table are decoded by column name into [`EventRow`], so
//! downstream stages never index into a row by position. Nested columns keep
//! their JSON text until a stage asks for them.

use crate::error::Result;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Columns of the event table used by the media and dataset stages
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EventRow {
    pub asset: String,
    pub asset_bundle: String,
    pub auction_type: String,
    pub total_price: String,
    pub payment_token: String,
    pub quantity: String,
    pub ending_price: String,
    pub is_private: String,
    pub starting_price: String,
}

impl EventRow {
    /// Parse the serialized `asset` column
    pub fn asset(&self) -> std::result::Result<AssetRef, serde_json::Error> {
        serde_json::from_str(&self.asset)
    }

    /// Parse the serialized `payment_token` column, falling back to the
    /// default descriptor when the column is empty
    pub fn payment_token(&self) -> std::result::Result<PaymentToken, serde_json::Error> {
        PaymentToken::from_cell(&self.payment_token)
    }
}

/// The media item an event refers to
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssetRef {
    #[serde(deserialize_with = "asset_id")]
    pub id: String,

    #[serde(default)]
    pub image_url: Option<String>,

    #[serde(default, deserialize_with = "lenient_count")]
    pub num_sales: Option<u64>,

    #[serde(default, deserialize_with = "lenient_text")]
    pub background_color: Option<String>,
}

fn asset_id<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("invalid asset id: {}", other))),
    }
}

/// Optional descriptive fields never fail the asset: anything unusable reads
/// as absent
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<u64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// Numbers arrive either as JSON numbers or as decimal strings
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0.0),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| de::Error::custom("number out of range")),
        Value::String(s) if s.trim().is_empty() => Ok(0.0),
        Value::String(s) => s.trim().parse().map_err(de::Error::custom),
        other => Err(de::Error::custom(format!("expected a number, got {}", other))),
    }
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| de::Error::custom("decimals out of range")),
        Value::String(s) => s.trim().parse().map_err(de::Error::custom),
        other => Err(de::Error::custom(format!("expected an integer, got {}", other))),
    }
}

/// Currency an event was settled in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentToken {
    #[serde(default)]
    pub symbol: String,

    #[serde(default, deserialize_with = "lenient_u32")]
    pub decimals: u32,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub eth_price: f64,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub usd_price: f64,
}

impl PaymentToken {
    /// Parse a table cell. Empty cells and JSON `null` yield the default
    /// `("", 0, 0, 0)` descriptor.
    pub fn from_cell(cell: &str) -> std::result::Result<Self, serde_json::Error> {
        let cell = cell.trim();
        if cell.is_empty() {
            return Ok(Self::default());
        }

        match serde_json::from_str::<Value>(cell)? {
            Value::Null => Ok(Self::default()),
            value => serde_json::from_value(value),
        }
    }
}

/// One decoded line of the event table
#[derive(Debug)]
pub struct EventLine {
    /// 1-based line number in the source file
    pub line: u64,

    pub row: std::result::Result<EventRow, csv::Error>,
}

/// Named-column reader over an event table; the header row is consumed on
/// open.
pub struct EventTable<R: Read> {
    reader: csv::Reader<R>,
    headers: csv::StringRecord,
    record: csv::StringRecord,
    finished: bool,
}

impl EventTable<File> {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_reader(File::open(path)?)
    }
}

impl<R: Read> EventTable<R> {
    pub fn from_reader(inner: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(inner);
        let headers = reader.headers()?.clone();

        Ok(Self {
            reader,
            headers,
            record: csv::StringRecord::new(),
            finished: false,
        })
    }
}

impl<R: Read> Iterator for EventTable<R> {
    type Item = EventLine;

    fn next(&mut self) -> Option<EventLine> {
        if self.finished {
            return None;
        }

        match self.reader.read_record(&mut self.record) {
            Ok(false) => {
                self.finished = true;
                None
            },
            Ok(true) => {
                let line = self.record.position().map(|p| p.line()).unwrap_or(0);
                let row = self.record.deserialize(Some(&self.headers));
                Some(EventLine { line, row })
            },
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                // An I/O failure will not clear up on the next read
                if e.is_io_error() {
                    self.finished = true;
                }
                Some(EventLine { line, row: Err(e) })
            },
        }
    }
}
