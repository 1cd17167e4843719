//! Tabular sink writer
//!
//! Flattens loosely-typed API records into fixed-width CSV rows and streams
//! them out one at a time. The header comes from the first record that is
//! kept; later records are assumed to share its shape.

use crate::error::Result;
use crate::opensea::Page;
use serde_json::{Map, Value};
use std::io::Write;
use tracing::{trace, warn};

/// Records without a singular asset describe bundle sales and are dropped.
pub const REQUIRED_NESTED_FIELD: &str = "asset";

/// A record value, split on whether it needs serializing before it fits
/// into a single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Scalar(&'a Value),
    Nested(&'a Value),
}

impl<'a> FieldValue<'a> {
    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::Object(_) | Value::Array(_) => FieldValue::Nested(value),
            _ => FieldValue::Scalar(value),
        }
    }

    /// Cell text. Nested values become compact JSON so they can be parsed
    /// back; strings are written unquoted and null as an empty cell.
    pub fn to_cell(&self) -> Result<String> {
        Ok(match self {
            FieldValue::Nested(value) => serde_json::to_string(value)?,
            FieldValue::Scalar(Value::Null) => String::new(),
            FieldValue::Scalar(Value::String(s)) => s.clone(),
            FieldValue::Scalar(other) => other.to_string(),
        })
    }
}

/// Whether a record carries the nested field it must be keyed on
pub fn is_retained(record: &Map<String, Value>, required: Option<&str>) -> bool {
    match required {
        Some(field) => !matches!(record.get(field), None | Some(Value::Null)),
        None => true,
    }
}

/// Cells of one record, in field order
pub fn flatten_record(record: &Map<String, Value>) -> Result<Vec<String>> {
    record
        .values()
        .map(|value| FieldValue::classify(value).to_cell())
        .collect()
}

/// Cells of `record` in `header` order. `None` when its keys are not
/// exactly the header's, in any order.
pub fn align_record(record: &Map<String, Value>, header: &[String]) -> Result<Option<Vec<String>>> {
    if record.len() != header.len() {
        return Ok(None);
    }

    let mut row = Vec::with_capacity(header.len());
    for key in header {
        let Some(value) = record.get(key) else {
            return Ok(None);
        };
        row.push(FieldValue::classify(value).to_cell()?);
    }
    Ok(Some(row))
}

/// Streaming CSV writer over any `Write`
pub struct TableSink<W: Write> {
    writer: csv::Writer<W>,
    required_field: Option<String>,
    header: Option<Vec<String>>,
    rows_written: usize,
    rows_mismatched: usize,
}

impl<W: Write> TableSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new().flexible(false).from_writer(inner),
            required_field: Some(REQUIRED_NESTED_FIELD.to_string()),
            header: None,
            rows_written: 0,
            rows_mismatched: 0,
        }
    }

    /// Change the nested field a record must carry; `None` keeps every record.
    pub fn requiring(mut self, field: Option<&str>) -> Self {
        self.required_field = field.map(str::to_string);
        self
    }

    /// Write one record. Returns `false` when it was skipped: it is not an
    /// object, lacks the required field, or its keys differ from the header.
    pub fn write_record(&mut self, record: &Value) -> Result<bool> {
        let Some(fields) = record.as_object() else {
            return Ok(false);
        };

        if !is_retained(fields, self.required_field.as_deref()) {
            trace!(field = ?self.required_field, "Skipping record without required field");
            return Ok(false);
        }

        let row = match &self.header {
            None => {
                let header: Vec<String> = fields.keys().cloned().collect();
                let row = flatten_record(fields)?;
                self.writer.write_record(&header)?;
                self.header = Some(header);
                row
            },
            Some(header) => match align_record(fields, header)? {
                Some(row) => row,
                None => {
                    warn!(
                        columns = header.len(),
                        fields = fields.len(),
                        "Record fields do not match the table header, skipping"
                    );
                    self.rows_mismatched += 1;
                    return Ok(false);
                },
            },
        };

        self.writer.write_record(&row)?;
        self.writer.flush()?;
        self.rows_written += 1;

        Ok(true)
    }

    /// Write every retained record of a page, returning how many were kept
    pub fn write_page(&mut self, page: &Page) -> Result<usize> {
        let mut written = 0;
        for record in &page.records {
            if self.write_record(record)? {
                written += 1;
            }
        }
        Ok(written)
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Records dropped because their fields did not match the header
    pub fn rows_mismatched(&self) -> usize {
        self.rows_mismatched
    }

    pub fn header_written(&self) -> bool {
        self.header.is_some()
    }

    /// Flush and hand back the underlying writer
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| crate::error::IngestError::Io(e.into_error()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(records: Vec<Value>) -> Page {
        Page {
            records,
            cursor: None,
        }
    }

    #[test]
    fn test_field_value_cells() {
        assert_eq!(FieldValue::classify(&json!(null)).to_cell().unwrap(), "");
        assert_eq!(FieldValue::classify(&json!("dutch")).to_cell().unwrap(), "dutch");
        assert_eq!(FieldValue::classify(&json!(3)).to_cell().unwrap(), "3");
        assert_eq!(FieldValue::classify(&json!(false)).to_cell().unwrap(), "false");

        let nested = json!({"symbol": "ETH", "decimals": 18});
        let field = FieldValue::classify(&nested);
        assert!(matches!(field, FieldValue::Nested(_)));
        assert_eq!(field.to_cell().unwrap(), r#"{"symbol":"ETH","decimals":18}"#);
    }

    #[test]
    fn test_header_from_first_retained_record() {
        let mut sink = TableSink::new(Vec::new());
        let written = sink
            .write_page(&page(vec![
                json!({"asset": null, "bundle_only": 1}),
                json!({"asset": {"id": 1}, "total_price": "100"}),
                json!({"asset": {"id": 2}, "total_price": "200"}),
            ]))
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(sink.rows_written(), 2);

        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "asset,total_price");
        assert_eq!(lines[1], r#""{""id"":1}",100"#);
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_empty_page_writes_nothing() {
        let mut sink = TableSink::new(Vec::new());
        assert_eq!(sink.write_page(&page(vec![])).unwrap(), 0);
        assert!(!sink.header_written());
        assert!(sink.into_inner().unwrap().is_empty());
    }

    #[test]
    fn test_missing_asset_field_is_skipped() {
        let mut sink = TableSink::new(Vec::new());
        assert!(!sink.write_record(&json!({"total_price": "5"})).unwrap());
        assert!(!sink.write_record(&json!("not an object")).unwrap());
        assert_eq!(sink.rows_written(), 0);
    }

    #[test]
    fn test_no_required_field_keeps_everything() {
        let mut sink = TableSink::new(Vec::new()).requiring(None);
        assert!(sink.write_record(&json!({"id": 7, "name": "punk"})).unwrap());
        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(out, "id,name\n7,punk\n");
    }

    #[test]
    fn test_reordered_keys_follow_header() {
        let mut sink = TableSink::new(Vec::new());
        sink.write_record(&json!({"asset": {"id": 1}, "total_price": "1"})).unwrap();
        assert!(sink.write_record(&json!({"total_price": "2", "asset": {"id": 2}})).unwrap());

        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[2], r#""{""id"":2}",2"#);
    }

    #[test]
    fn test_mismatched_record_is_skipped() {
        let mut sink = TableSink::new(Vec::new());
        let written = sink
            .write_page(&page(vec![
                json!({"asset": {"id": 1}, "total_price": "1"}),
                json!({"asset": {"id": 2}, "total_price": "2", "extra": true}),
                json!({"asset": {"id": 3}, "quantity": "1"}),
                json!({"asset": {"id": 4}, "total_price": "4"}),
            ]))
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(sink.rows_written(), 2);
        assert_eq!(sink.rows_mismatched(), 2);

        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(out.lines().count(), 3);
        assert!(out.ends_with("\"{\"\"id\"\":4}\",4\n"));
    }

    #[test]
    fn test_nested_cells_parse_back() {
        let asset = json!({
            "id": 42,
            "image_url": "https://img.example/42.png",
            "traits": [{"k": "v"}],
            "num_sales": 3,
            "background_color": null
        });
        let token = json!({"symbol": "WETH", "decimals": 18, "eth_price": "1.000000000000000"});

        let mut sink = TableSink::new(Vec::new());
        sink.write_record(&json!({"asset": asset.clone(), "payment_token": token.clone(), "quantity": "1"}))
            .unwrap();
        let out = sink.into_inner().unwrap();

        let mut reader = csv::Reader::from_reader(out.as_slice());
        let row = reader.records().next().unwrap().unwrap();
        let parsed_asset: Value = serde_json::from_str(&row[0]).unwrap();
        let parsed_token: Value = serde_json::from_str(&row[1]).unwrap();
        assert_eq!(parsed_asset, asset);
        assert_eq!(parsed_token, token);
        assert_eq!(&row[2], "1");
    }
}
