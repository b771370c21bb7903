use serde_json::Value;
use tracing::{debug, warn};

use docsearch_core::error::{Error, Result};
use docsearch_core::traits::SearchBackend;
use docsearch_core::types::{BulkOperation, BulkOutcome, Record};

/// Writes a batch of records as a single bulk call.
pub struct BulkWriter<'a, B: SearchBackend + ?Sized> {
    backend: &'a B,
}

impl<'a, B: SearchBackend + ?Sized> BulkWriter<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Index every record into `index`, keyed by `id_field` when given.
    ///
    /// Id problems fail the whole batch before anything is sent. Documents
    /// the service rejects are reported in the outcome, not raised. An empty
    /// batch sends nothing.
    pub async fn write(&self, index: &str, records: Vec<Record>, id_field: Option<&str>) -> Result<BulkOutcome> {
        if records.is_empty() {
            return Ok(BulkOutcome::default());
        }
        let ops = to_operations(index, records, id_field)?;
        let outcome = self.backend.bulk(&ops).await?;
        if outcome.is_clean() {
            debug!(index, documents = outcome.succeeded, "bulk write");
        } else {
            let first = outcome.failures.first().map(|f| f.reason.as_str()).unwrap_or_default();
            warn!(
                index,
                succeeded = outcome.succeeded,
                failed = outcome.failures.len(),
                first_reason = first,
                "bulk write had rejected documents"
            );
        }
        Ok(outcome)
    }
}

pub fn to_operations(index: &str, records: Vec<Record>, id_field: Option<&str>) -> Result<Vec<BulkOperation>> {
    records
        .into_iter()
        .enumerate()
        .map(|(row, record)| {
            let id = match id_field {
                Some(field) => Some(document_id(&record, field).map_err(|e| match e {
                    Error::Data(msg) => Error::Data(format!("record {row}: {msg}")),
                    other => other,
                })?),
                None => None,
            };
            Ok(BulkOperation::index(index, id, record))
        })
        .collect()
}

/// Document id taken from `field`: strings verbatim, numbers and booleans
/// in their JSON text form.
pub fn document_id(record: &Record, field: &str) -> Result<String> {
    match record.get(field) {
        None => Err(Error::Data(format!("id field '{field}' is missing"))),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(Error::Data(format!("id field '{field}' holds a non-scalar value: {other}"))),
    }
}
