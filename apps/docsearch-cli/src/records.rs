//! Records from a JSON array or newline-delimited JSON.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;

use docsearch_core::types::Record;

pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_records(&text).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse_records(text: &str) -> Result<Vec<Record>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        let values: Vec<Value> = serde_json::from_str(trimmed)?;
        return values.into_iter().enumerate().map(|(i, v)| into_record(i + 1, v)).collect();
    }
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let value: Value = serde_json::from_str(line).with_context(|| format!("line {}", i + 1))?;
            into_record(i + 1, value)
        })
        .collect()
}

fn into_record(position: usize, value: Value) -> Result<Record> {
    match value {
        Value::Object(map) => Ok(map),
        other => bail!("record {position} is not a JSON object: {other}"),
    }
}
