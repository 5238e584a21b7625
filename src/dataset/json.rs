//! JSON and JSONL loading
//!
//! Exports arrive row-oriented. Loading pivots them into a [`DataFrame`]
//! using a [`FrameSchema`]; a cell that cannot be converted to its column's
//! kind becomes null so that the loader can reject the row with a reason
//! instead of the whole file failing.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use super::{ColumnData, ColumnKind, DataFrame, DatasetError, DatasetResult};

/// Ordered column names and kinds to extract from each record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSchema {
    columns: Vec<(String, ColumnKind)>,
}

impl FrameSchema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column
    pub fn column(mut self, name: impl Into<String>, kind: ColumnKind) -> Self {
        self.columns.push((name.into(), kind));
        self
    }

    /// Columns in declaration order
    pub fn columns(&self) -> &[(String, ColumnKind)] {
        &self.columns
    }
}

/// Accumulates cells column by column while records stream in
struct FrameBuilder<'a> {
    schema: &'a FrameSchema,
    columns: Vec<ColumnData>,
}

impl<'a> FrameBuilder<'a> {
    fn new(schema: &'a FrameSchema) -> Self {
        let columns = schema
            .columns
            .iter()
            .map(|(_, kind)| ColumnData::nulls(*kind, 0))
            .collect();
        Self { schema, columns }
    }

    fn push_record(&mut self, index: usize, record: &Value) -> DatasetResult<()> {
        let object = record
            .as_object()
            .ok_or(DatasetError::NotAnObject(index))?;

        for ((name, _), column) in self.schema.columns.iter().zip(self.columns.iter_mut()) {
            let cell = object.get(name).unwrap_or(&Value::Null);
            match column {
                ColumnData::Text(cells) => cells.push(text_cell(cell)),
                ColumnData::Integer(cells) => cells.push(integer_cell(cell)),
                ColumnData::Timestamp(cells) => cells.push(timestamp_cell(cell)),
            }
        }
        Ok(())
    }

    fn finish(self) -> DatasetResult<DataFrame> {
        let mut frame = DataFrame::new();
        for ((name, _), data) in self.schema.columns.iter().zip(self.columns) {
            frame.push_column(name.clone(), data)?;
        }
        Ok(frame)
    }
}

fn text_cell(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn integer_cell(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn timestamp_cell(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        // Epoch seconds
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

impl DataFrame {
    /// Build a frame from already-parsed JSON objects
    pub fn from_json_records(records: &[Value], schema: &FrameSchema) -> DatasetResult<Self> {
        let mut builder = FrameBuilder::new(schema);
        for (index, record) in records.iter().enumerate() {
            builder.push_record(index, record)?;
        }
        builder.finish()
    }

    /// Parse a single JSON array of objects
    pub fn from_json_reader<R: Read>(reader: R, schema: &FrameSchema) -> DatasetResult<Self> {
        let value: Value =
            serde_json::from_reader(reader).map_err(|e| DatasetError::JsonParse {
                line: e.line(),
                error: e.to_string(),
            })?;

        match value {
            Value::Array(records) => Self::from_json_records(&records, schema),
            other => Self::from_json_records(std::slice::from_ref(&other), schema),
        }
    }

    /// Parse newline-delimited JSON, one object per line
    pub fn from_jsonl_reader<R: BufRead>(reader: R, schema: &FrameSchema) -> DatasetResult<Self> {
        let mut builder = FrameBuilder::new(schema);
        let mut index = 0;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();

            // Skip empty lines
            if trimmed.is_empty() {
                continue;
            }

            let record: Value =
                serde_json::from_str(trimmed).map_err(|e| DatasetError::JsonParse {
                    line: line_no + 1,
                    error: e.to_string(),
                })?;
            builder.push_record(index, &record)?;
            index += 1;
        }

        builder.finish()
    }

    /// Load a file based on its extension
    ///
    /// `.jsonl` and `.ndjson` are read line by line, anything else as a
    /// single JSON document.
    pub fn from_path(path: &Path, schema: &FrameSchema) -> DatasetResult<Self> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let file = File::open(path)?;

        match extension.to_lowercase().as_str() {
            "jsonl" | "ndjson" => Self::from_jsonl_reader(BufReader::new(file), schema),
            _ => Self::from_json_reader(BufReader::new(file), schema),
        }
    }
}
