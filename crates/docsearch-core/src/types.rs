//! Domain types shared by the ingestion and query crates.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One document to be indexed: field name to value, insertion ordered.
pub type Record = Map<String, Value>;

/// Name of the source field holding the vector computed from `field`.
pub fn embedding_key(field: &str) -> String {
    format!("{field}_embedding")
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OpType {
    Index,
}

/// A single entry of a bulk request, derived 1:1 from a [`Record`].
///
/// - `index`: target index name
/// - `id`: explicit document id; `None` lets the service assign one
/// - `body`: the document source
#[derive(Debug, Clone)]
pub struct BulkOperation {
    pub op: OpType,
    pub index: String,
    pub id: Option<String>,
    pub body: Record,
}

impl BulkOperation {
    pub fn index(index: impl Into<String>, id: Option<String>, body: Record) -> Self {
        Self { op: OpType::Index, index: index.into(), id, body }
    }
}

/// A document the service refused within an otherwise accepted bulk call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkFailure {
    /// Position of the operation within its bulk request. In an ingestion
    /// report it is the zero-based row of the input instead.
    pub position: usize,
    pub id: Option<String>,
    pub status: u16,
    pub reason: String,
}

/// Per-document result of one or more bulk calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub succeeded: usize,
    pub failures: Vec<BulkFailure>,
}

impl BulkOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.succeeded + self.failures.len()
    }

    /// Fold in the outcome of a bulk call whose first operation sits at
    /// `offset` in the combined input.
    pub fn absorb(&mut self, other: BulkOutcome, offset: usize) {
        self.succeeded += other.succeeded;
        self.failures.extend(other.failures.into_iter().map(|f| BulkFailure { position: f.position + offset, ..f }));
    }
}

/// A raw hit as returned by the search service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Record,
}

/// How the column set of a tabular search result is derived from its hits.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ColumnPolicy {
    /// Keys of the first hit only; later hits' extra keys are dropped.
    FirstHit,
    /// Keys of every hit, in order of first appearance; gaps are null.
    #[default]
    Union,
}
