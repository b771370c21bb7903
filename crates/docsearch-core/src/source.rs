//! Tabular sources read as a lazy sequence of bounded record chunks.

use serde_json::{Number, Value};
use std::fs::File;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::Record;

#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub chunk_size: usize,
    pub delimiter: u8,
    /// Treat the first column as a row index and leave it out of the records.
    pub index_column: bool,
    /// Data rows to skip before the first chunk (resume offset).
    pub skip_rows: u64,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { chunk_size: 10_000, delimiter: b',', index_column: false, skip_rows: 0 }
    }
}

/// Iterator over a delimited file with a header row, `chunk_size` records at a time.
pub struct CsvChunks {
    reader: csv::Reader<File>,
    headers: Vec<String>,
    chunk_size: usize,
    first_column: usize,
    row: csv::StringRecord,
    done: bool,
}

impl CsvChunks {
    pub fn open(path: &Path, options: &CsvOptions) -> Result<Self> {
        if options.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be > 0".to_string()));
        }
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(true)
            .from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let first_column = usize::from(options.index_column);
        let mut row = csv::StringRecord::new();
        let mut skipped = 0u64;
        let mut done = false;
        while skipped < options.skip_rows {
            if !reader.read_record(&mut row)? {
                done = true;
                break;
            }
            skipped += 1;
        }
        tracing::debug!(path = %path.display(), columns = headers.len(), skipped, "opened csv source");
        Ok(Self { reader, headers, chunk_size: options.chunk_size, first_column, row, done })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers[self.first_column.min(self.headers.len())..]
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        for (i, name) in self.headers.iter().enumerate().skip(self.first_column) {
            let cell = self.row.get(i).unwrap_or("");
            record.insert(name.clone(), parse_cell(cell));
        }
        record
    }
}

impl Iterator for CsvChunks {
    type Item = Result<Vec<Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut chunk = Vec::with_capacity(self.chunk_size);
        while chunk.len() < self.chunk_size {
            match self.reader.read_record(&mut self.row) {
                Ok(true) => chunk.push(self.to_record()),
                Ok(false) => {
                    self.done = true;
                    break;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
        if chunk.is_empty() { None } else { Some(Ok(chunk)) }
    }
}

/// Typed cell value: empty → null, then integer, float, boolean, else string.
///
/// Integers beyond the `u64` range stay strings, so long numeric ids keep
/// every digit.
pub fn parse_cell(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(u) = trimmed.parse::<u64>() {
        return Value::Number(u.into());
    }
    if is_integer_literal(trimmed) {
        return Value::String(cell.to_string());
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match trimmed {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}

fn is_integer_literal(text: &str) -> bool {
    let digits = text.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Split caller-supplied records into chunks of at most `chunk_size`.
pub fn chunked(records: Vec<Record>, chunk_size: usize) -> Result<impl Iterator<Item = Result<Vec<Record>>>> {
    if chunk_size == 0 {
        return Err(Error::InvalidConfig("chunk_size must be > 0".to_string()));
    }
    let mut rest = records.into_iter().peekable();
    Ok(std::iter::from_fn(move || {
        rest.peek()?;
        Some(Ok(rest.by_ref().take(chunk_size).collect()))
    }))
}
