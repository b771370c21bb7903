//! Bulk request encoding and bulk response inspection.

use serde_json::{json, Value};

use docsearch_core::error::Result;
use docsearch_core::types::{BulkFailure, BulkOperation, BulkOutcome, OpType};

/// Encode operations as the newline-delimited action/source pairs of `/_bulk`.
pub fn encode_ndjson(ops: &[BulkOperation]) -> Result<String> {
    let mut out = String::new();
    for op in ops {
        let mut meta = json!({ "_index": op.index });
        if let Some(id) = &op.id {
            meta["_id"] = Value::String(id.clone());
        }
        let action = match op.op {
            OpType::Index => json!({ "index": meta }),
        };
        out.push_str(&serde_json::to_string(&action)?);
        out.push('\n');
        out.push_str(&serde_json::to_string(&op.body)?);
        out.push('\n');
    }
    Ok(out)
}

/// Turn a `/_bulk` response into per-document counts and failures.
///
/// Items are matched to `ops` by position. A response without `items` is
/// taken at face value from its `errors` flag.
pub fn parse_bulk_response(response: &Value, ops: &[BulkOperation]) -> BulkOutcome {
    let Some(items) = response.get("items").and_then(Value::as_array) else {
        let errors = response.get("errors").and_then(Value::as_bool).unwrap_or(false);
        return if errors {
            BulkOutcome {
                succeeded: 0,
                failures: ops
                    .iter()
                    .enumerate()
                    .map(|(position, op)| BulkFailure {
                        position,
                        id: op.id.clone(),
                        status: 0,
                        reason: "bulk request reported errors without item details".to_string(),
                    })
                    .collect(),
            }
        } else {
            BulkOutcome { succeeded: ops.len(), failures: Vec::new() }
        };
    };

    let mut outcome = BulkOutcome::default();
    for (position, item) in items.iter().enumerate() {
        // Each item is `{ "<op type>": { _id, status, error? } }`.
        let Some(result) = item.as_object().and_then(|o| o.values().next()) else {
            continue;
        };
        let status = result.get("status").and_then(Value::as_u64).map_or(0, |s| u16::try_from(s).unwrap_or(u16::MAX));
        let error = result.get("error");
        if error.is_none() && (200..300).contains(&status) {
            outcome.succeeded += 1;
            continue;
        }
        let id = result
            .get("_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| ops.get(position).and_then(|op| op.id.clone()));
        outcome.failures.push(BulkFailure { position, id, status, reason: error_reason(error) });
    }
    outcome
}

fn error_reason(error: Option<&Value>) -> String {
    match error {
        Some(Value::String(s)) => s.clone(),
        Some(e) => {
            let kind = e.get("type").and_then(Value::as_str).unwrap_or("error");
            match e.get("reason").and_then(Value::as_str) {
                Some(reason) => format!("{kind}: {reason}"),
                None => kind.to_string(),
            }
        }
        None => "unexpected item status".to_string(),
    }
}
