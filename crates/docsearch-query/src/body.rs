//! Query DSL bodies.

use serde_json::{json, Value};

use docsearch_core::error::{Error, Result};
use docsearch_core::types::embedding_key;
use docsearch_embed::embed_checked;

use crate::query::{QueryKind, SearchQuery};

/// Body for `query` under an already bound mode. Dense mode embeds the text here.
pub fn build_body(kind: &QueryKind<'_>, query: &SearchQuery) -> Result<Value> {
    if query.field.is_empty() {
        return Err(Error::InvalidConfig("search field must not be empty".to_string()));
    }
    match kind {
        QueryKind::Match => Ok(lexical_body("match", &query.field, &query.text, query.size)),
        QueryKind::Term => Ok(lexical_body("term", &query.field, &query.text, query.size)),
        QueryKind::Fuzzy => Ok(lexical_body("fuzzy", &query.field, &query.text, query.size)),
        QueryKind::Wildcard => Ok(lexical_body("wildcard", &query.field, &query.text, query.size)),
        QueryKind::Dense(embedder) => {
            let mut vectors = embed_checked(*embedder, &[query.text.clone()])?;
            let vector = vectors.pop().ok_or_else(|| Error::Data("embedder returned no vector".to_string()))?;
            Ok(dense_body(&query.field, &vector, query.size))
        }
    }
}

/// `{clause: {field: text}}`, leaving the field's embedding out of the hits.
pub fn lexical_body(clause: &str, field: &str, text: &str, size: usize) -> Value {
    json!({
        "query": { clause: { field: text } },
        "_source": { "excludes": [embedding_key(field)] },
        "size": size,
    })
}

/// Cosine similarity against `<field>_embedding`, shifted by +1 so scores stay non-negative.
pub fn dense_body(field: &str, vector: &[f32], size: usize) -> Value {
    let key = embedding_key(field);
    json!({
        "query": {
            "script_score": {
                "query": { "match_all": {} },
                "script": {
                    "source": format!("cosineSimilarity(params.query_vector, '{key}') + 1.0"),
                    "params": { "query_vector": vector },
                }
            }
        },
        "_source": { "excludes": [key] },
        "size": size,
    })
}

pub fn match_all_body(size: usize) -> Value {
    json!({ "query": { "match_all": {} }, "size": size })
}
