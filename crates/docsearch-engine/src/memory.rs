//! In-process search service.
//!
//! Implements the same delete / create / bulk / search contract as the REST
//! service for single-field `match`, `term`, `fuzzy`, `wildcard`, `match_all`
//! and `script_score` (cosine) queries, so the client can run and be tested
//! without a server. Not a ranking engine: scores are simple and only
//! meaningful relative to each other.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use docsearch_core::error::{Error, Result};
use docsearch_core::traits::SearchBackend;
use docsearch_core::types::{BulkFailure, BulkOperation, BulkOutcome, Record};

use crate::matching::{as_vector, auto_fuzziness, cosine, levenshtein, tokenize, value_text, wildcard_match};

const DEFAULT_SIZE: usize = 10;

/// Remote calls received, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub ping: usize,
    pub delete: usize,
    pub create: usize,
    pub bulk: usize,
    pub search: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.ping + self.delete + self.create + self.bulk + self.search
    }
}

#[derive(Default)]
struct StoredIndex {
    body: Value,
    docs: Vec<(String, Record)>,
}

impl StoredIndex {
    /// Declared dims of a `dense_vector` property, if any.
    fn dense_dims(&self, field: &str) -> Option<usize> {
        let prop = self.body.pointer(&format!("/mappings/properties/{field}"))?;
        if prop.get("type")?.as_str()? != "dense_vector" {
            return None;
        }
        prop.get("dims")?.as_u64().and_then(|d| usize::try_from(d).ok())
    }

    fn check_document(&self, doc: &Record) -> std::result::Result<(), String> {
        for (field, value) in doc {
            if let Some(dims) = self.dense_dims(field) {
                let len = as_vector(value).map(|v| v.len());
                if len != Some(dims) {
                    return Err(format!(
                        "field [{field}] expects a dense vector of {dims} dims, got {}",
                        len.map_or_else(|| "a non-vector value".to_string(), |l| l.to_string())
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct State {
    indices: BTreeMap<String, StoredIndex>,
    calls: CallCounts,
    next_id: u64,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls
    }

    pub fn index_names(&self) -> Vec<String> {
        self.state.lock().indices.keys().cloned().collect()
    }

    /// Settings + mappings the index was created with (`{}` when auto-created).
    pub fn index_body(&self, index: &str) -> Option<Value> {
        self.state.lock().indices.get(index).map(|i| i.body.clone())
    }

    pub fn doc_count(&self, index: &str) -> usize {
        self.state.lock().indices.get(index).map_or(0, |i| i.docs.len())
    }

    pub fn document(&self, index: &str, id: &str) -> Option<Record> {
        let state = self.state.lock();
        let stored = state.indices.get(index)?;
        stored.docs.iter().find(|(doc_id, _)| doc_id == id).map(|(_, doc)| doc.clone())
    }

    /// All documents of an index in insertion order.
    pub fn documents(&self, index: &str) -> Vec<(String, Record)> {
        self.state.lock().indices.get(index).map(|i| i.docs.clone()).unwrap_or_default()
    }
}

fn remote(status: u16, kind: &str, reason: String) -> Error {
    let body = json!({ "error": { "type": kind, "reason": reason }, "status": status });
    Error::Remote { status, body: body.to_string() }
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    async fn ping(&self) -> Result<bool> {
        self.state.lock().calls.ping += 1;
        Ok(true)
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.delete += 1;
        match state.indices.remove(index) {
            Some(_) => Ok(()),
            None => Err(remote(404, "index_not_found_exception", format!("no such index [{index}]"))),
        }
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.create += 1;
        if state.indices.contains_key(index) {
            return Err(remote(400, "resource_already_exists_exception", format!("index [{index}] already exists")));
        }
        if !body.is_object() {
            return Err(remote(400, "parse_exception", "index body must be an object".to_string()));
        }
        state.indices.insert(index.to_string(), StoredIndex { body: body.clone(), docs: Vec::new() });
        Ok(())
    }

    async fn bulk(&self, ops: &[BulkOperation]) -> Result<BulkOutcome> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.calls.bulk += 1;
        let mut outcome = BulkOutcome::default();
        for (position, op) in ops.iter().enumerate() {
            let stored = state
                .indices
                .entry(op.index.clone())
                .or_insert_with(|| StoredIndex { body: json!({}), docs: Vec::new() });
            if let Err(reason) = stored.check_document(&op.body) {
                outcome.failures.push(BulkFailure {
                    position,
                    id: op.id.clone(),
                    status: 400,
                    reason: format!("mapper_parsing_exception: {reason}"),
                });
                continue;
            }
            let id = match &op.id {
                Some(id) => id.clone(),
                None => {
                    state.next_id += 1;
                    format!("auto-{}", state.next_id)
                }
            };
            match stored.docs.iter_mut().find(|(doc_id, _)| *doc_id == id) {
                Some(slot) => slot.1 = op.body.clone(),
                None => stored.docs.push((id, op.body.clone())),
            }
            outcome.succeeded += 1;
        }
        Ok(outcome)
    }

    async fn search(&self, index: &str, body: &Value) -> Result<Value> {
        let mut state = self.state.lock();
        state.calls.search += 1;
        let Some(stored) = state.indices.get(index) else {
            return Err(remote(404, "index_not_found_exception", format!("no such index [{index}]")));
        };
        let query = body.get("query").cloned().unwrap_or_else(|| json!({ "match_all": {} }));
        let size = body
            .get("size")
            .and_then(Value::as_u64)
            .map_or(DEFAULT_SIZE, |s| usize::try_from(s).unwrap_or(usize::MAX));
        let excludes: Vec<&str> = body
            .pointer("/_source/excludes")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut scored = Vec::new();
        for (pos, (_, doc)) in stored.docs.iter().enumerate() {
            if let Some(score) = evaluate(&query, doc)? {
                scored.push((score, pos));
            }
        }
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        let total = scored.len();
        let max_score = scored.first().map(|s| s.0);

        let hits: Vec<Value> = scored
            .into_iter()
            .take(size)
            .map(|(score, pos)| {
                let (id, doc) = &stored.docs[pos];
                let mut source = doc.clone();
                for key in &excludes {
                    source.shift_remove(*key);
                }
                json!({ "_index": index, "_id": id, "_score": score, "_source": source })
            })
            .collect();

        Ok(json!({
            "took": 0,
            "timed_out": false,
            "hits": {
                "total": { "value": total, "relation": "eq" },
                "max_score": max_score,
                "hits": hits,
            }
        }))
    }
}

/// Score of `doc` under `query`, `None` when it does not match.
fn evaluate(query: &Value, doc: &Record) -> Result<Option<f64>> {
    let (kind, clause) = single_entry(query)
        .ok_or_else(|| remote(400, "parsing_exception", format!("malformed query: {query}")))?;
    match kind {
        "match_all" => Ok(Some(1.0)),
        "match" | "term" | "fuzzy" | "wildcard" => {
            let (field, param) = single_entry(clause)
                .ok_or_else(|| remote(400, "parsing_exception", format!("[{kind}] needs a single field")))?;
            let wanted = clause_value(param);
            let Some(value) = doc.get(field) else { return Ok(None) };
            Ok(match kind {
                "match" => score_match(&wanted, value),
                "term" => score_term(&wanted, value),
                "fuzzy" => score_fuzzy(&wanted, value),
                _ => score_wildcard(&wanted, value),
            })
        }
        "script_score" => score_script(clause, doc),
        other => Err(remote(400, "parsing_exception", format!("unknown query [{other}]"))),
    }
}

fn single_entry(value: &Value) -> Option<(&str, &Value)> {
    let obj: &Map<String, Value> = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    obj.iter().next().map(|(k, v)| (k.as_str(), v))
}

/// `{field: "x"}` and `{field: {"query"|"value": "x"}}` both carry "x".
fn clause_value(param: &Value) -> Value {
    match param {
        Value::Object(o) => o.get("query").or_else(|| o.get("value")).cloned().unwrap_or(Value::Null),
        other => other.clone(),
    }
}

fn score_match(wanted: &Value, value: &Value) -> Option<f64> {
    let terms = tokenize(&value_text(wanted)?);
    let tokens = tokenize(&value_text(value)?);
    if terms.is_empty() || tokens.is_empty() {
        return None;
    }
    let tf = tokens.iter().filter(|t| terms.contains(t)).count();
    if tf == 0 {
        return None;
    }
    Some(tf as f64 / (tokens.len() as f64).sqrt())
}

fn score_term(wanted: &Value, value: &Value) -> Option<f64> {
    let wanted = value_text(wanted)?;
    let hit = match value {
        Value::Array(items) => items.iter().any(|v| value_text(v).as_deref() == Some(wanted.as_str())),
        other => value_text(other).as_deref() == Some(wanted.as_str()),
    };
    hit.then_some(1.0)
}

fn score_fuzzy(wanted: &Value, value: &Value) -> Option<f64> {
    let term = value_text(wanted)?.to_lowercase();
    let max = auto_fuzziness(&term);
    let best = tokenize(&value_text(value)?).iter().map(|t| levenshtein(&term, t)).min()?;
    (best <= max).then(|| 1.0 / (1.0 + best as f64))
}

fn score_wildcard(wanted: &Value, value: &Value) -> Option<f64> {
    let pattern = value_text(wanted)?;
    let text = value_text(value)?;
    let lowered = pattern.to_lowercase();
    let hit = wildcard_match(&pattern, &text) || tokenize(&text).iter().any(|t| wildcard_match(&lowered, t));
    hit.then_some(1.0)
}

/// `script_score` restricted to `cosineSimilarity(params.<vec>, '<field>') [+ c]`.
fn score_script(clause: &Value, doc: &Record) -> Result<Option<f64>> {
    let inner = clause.get("query").cloned().unwrap_or_else(|| json!({ "match_all": {} }));
    if evaluate(&inner, doc)?.is_none() {
        return Ok(None);
    }
    let script = clause.get("script").ok_or_else(|| remote(400, "parsing_exception", "[script_score] requires [script]".to_string()))?;
    let source = script.get("source").and_then(Value::as_str).unwrap_or_default();
    let (field, offset) = parse_cosine_script(source)
        .ok_or_else(|| remote(400, "script_exception", format!("unsupported script: {source}")))?;
    let query_vector = script
        .pointer("/params/query_vector")
        .and_then(as_vector)
        .ok_or_else(|| remote(400, "script_exception", "missing params.query_vector".to_string()))?;
    let Some(stored) = doc.get(&field).and_then(as_vector) else { return Ok(None) };
    match cosine(&query_vector, &stored) {
        Some(sim) => Ok(Some(sim + offset)),
        None => Err(remote(
            400,
            "script_exception",
            format!("query vector has {} dims, field [{field}] has {}", query_vector.len(), stored.len()),
        )),
    }
}

fn parse_cosine_script(source: &str) -> Option<(String, f64)> {
    let rest = source.trim().strip_prefix("cosineSimilarity(")?;
    let close = rest.find(')')?;
    let args = &rest[..close];
    let field = args.split(',').nth(1)?.trim().trim_matches(|c| c == '\'' || c == '"').to_string();
    let tail = rest[close + 1..].trim();
    let offset = match tail.strip_prefix('+') {
        Some(c) => c.trim().parse().ok()?,
        None if tail.is_empty() => 0.0,
        None => return None,
    };
    Some((field, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_script_is_parsed() {
        assert_eq!(
            parse_cosine_script("cosineSimilarity(params.query_vector, 'title_embedding') + 1.0"),
            Some(("title_embedding".to_string(), 1.0))
        );
        assert_eq!(parse_cosine_script("cosineSimilarity(params.v, \"f\")"), Some(("f".to_string(), 0.0)));
        assert_eq!(parse_cosine_script("dotProduct(params.v, 'f')"), None);
    }
}
