//! Delimited-text bar reader.
//!
//! Reads one or more delimited files for a single asset, concatenated in the
//! order given. Every row must carry the configured datetime column,
//! parseable with the configured chrono format string; remaining columns
//! become integer, float, or text cells by first successful parse.

use crate::data::reader::{BarReader, DataError, ReaderBar};
use crate::domain::{CellValue, FieldId};
use chrono::NaiveDateTime;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

/// Parsing options for [`CsvReader`].
#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub datetime_column: FieldId,
    /// chrono format string, e.g. `%Y-%m-%d %H:%M:%S`.
    pub datetime_format: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            datetime_column: FieldId::new("datetime"),
            datetime_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

/// Bar reader over delimited text files.
#[derive(Debug)]
pub struct CsvReader {
    bars: VecDeque<ReaderBar>,
}

impl CsvReader {
    /// Parse every path up front, concatenating bars in path order. Each
    /// file must yield at least one bar.
    pub fn new(
        paths: impl IntoIterator<Item = PathBuf>,
        options: &CsvOptions,
    ) -> Result<Self, DataError> {
        let mut bars = VecDeque::new();
        let mut any_path = false;
        for path in paths {
            any_path = true;
            let before = bars.len();
            read_file(&path, options, &mut bars)?;
            if bars.len() == before {
                return Err(DataError::EmptySource { path: display(&path) });
            }
        }
        if !any_path {
            return Err(DataError::NoSources);
        }
        Ok(Self { bars })
    }
}

impl BarReader for CsvReader {
    fn peek(&mut self) -> Option<&ReaderBar> {
        self.bars.front()
    }

    fn pop_first(&mut self) -> Option<ReaderBar> {
        self.bars.pop_front()
    }
}

fn read_file(
    path: &Path,
    options: &CsvOptions,
    out: &mut VecDeque<ReaderBar>,
) -> Result<(), DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .from_path(path)
        .map_err(|e| DataError::Io { path: display(path), message: e.to_string() })?;

    let headers: Vec<FieldId> = reader
        .headers()
        .map_err(|e| DataError::Io { path: display(path), message: e.to_string() })?
        .iter()
        .map(|h| FieldId::new(h.trim()))
        .collect();

    for (row_idx, record) in reader.records().enumerate() {
        let row = row_idx + 2; // 1-based, after the header line
        let record = record
            .map_err(|e| DataError::Parse { path: display(path), row, message: e.to_string() })?;

        let mut datetime = None;
        let mut fields = HashMap::with_capacity(headers.len());
        for (header, raw) in headers.iter().zip(record.iter()) {
            if header == &options.datetime_column {
                let parsed = NaiveDateTime::parse_from_str(raw.trim(), &options.datetime_format)
                    .map_err(|e| DataError::Parse {
                        path: display(path),
                        row,
                        message: format!("bad datetime `{raw}`: {e}"),
                    })?;
                datetime = Some(parsed.and_utc());
            } else {
                fields.insert(header.clone(), parse_cell(raw));
            }
        }

        let datetime = datetime.ok_or_else(|| DataError::Parse {
            path: display(path),
            row,
            message: format!("missing datetime column `{}`", options.datetime_column),
        })?;
        out.push_back(ReaderBar { datetime, fields });
    }
    Ok(())
}

fn parse_cell(raw: &str) -> CellValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return CellValue::Missing;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return CellValue::Int64(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return CellValue::Float64(f);
    }
    CellValue::Text(trimmed.to_string())
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
