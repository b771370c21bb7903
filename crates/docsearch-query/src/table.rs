//! Normalization of raw hits into a table.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use docsearch_core::error::{Error, Result};
use docsearch_core::types::{ColumnPolicy, SearchHit};

pub const SCORE_COLUMN: &str = "_score";

/// `[score] + source values`, aligned with [`SearchResult::columns`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub score: Option<f64>,
    pub values: Vec<Value>,
}

/// Tabular view of one search response. Columns start with `_score`; an
/// empty result has neither columns nor rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Value of `column` in row `row`; `_score` included.
    pub fn get(&self, row: usize, column: &str) -> Option<Value> {
        let row = self.rows.get(row)?;
        if column == SCORE_COLUMN {
            return Some(row.score.map_or(Value::Null, Value::from));
        }
        let pos = self.columns.iter().skip(1).position(|c| c == column)?;
        row.values.get(pos).cloned()
    }

    pub fn from_response(response: &Value, policy: ColumnPolicy) -> Result<Self> {
        Ok(Self::from_hits(&hits_of(response)?, policy))
    }

    pub fn from_hits(hits: &[SearchHit], policy: ColumnPolicy) -> Self {
        let Some(first) = hits.first() else {
            return Self::default();
        };
        let mut keys: Vec<String> = first.source.keys().cloned().collect();
        if policy == ColumnPolicy::Union {
            for hit in &hits[1..] {
                for key in hit.source.keys() {
                    if !keys.contains(key) {
                        keys.push(key.clone());
                    }
                }
            }
        }
        let rows = hits
            .iter()
            .map(|hit| Row {
                score: hit.score,
                values: keys.iter().map(|k| hit.source.get(k).cloned().unwrap_or(Value::Null)).collect(),
            })
            .collect();
        let mut columns = Vec::with_capacity(keys.len() + 1);
        columns.push(SCORE_COLUMN.to_string());
        columns.extend(keys);
        Self { columns, rows }
    }
}

/// `hits.hits` of a search response.
pub fn hits_of(response: &Value) -> Result<Vec<SearchHit>> {
    let hits = response
        .pointer("/hits/hits")
        .ok_or_else(|| Error::Data("search response has no hits.hits".to_string()))?;
    Ok(serde_json::from_value(hits.clone())?)
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() {
            return writeln!(f, "(no results)");
        }
        let body: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| {
                let mut line = vec![r.score.map_or_else(String::new, |s| format!("{s:.4}"))];
                line.extend(r.values.iter().map(cell));
                line
            })
            .collect();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| body.iter().map(|l| l[i].chars().count()).chain([c.chars().count()]).max().unwrap_or(0))
            .collect();
        render_line(f, &self.columns, &widths)?;
        for line in &body {
            render_line(f, line, &widths)?;
        }
        Ok(())
    }
}

fn render_line(f: &mut fmt::Formatter<'_>, cells: &[String], widths: &[usize]) -> fmt::Result {
    let padded: Vec<String> = cells.iter().zip(widths).map(|(c, &w)| format!("{c:<w$}")).collect();
    writeln!(f, "{}", padded.join("  ").trim_end())
}
