use serde_json::Value;
use tracing::debug;

use docsearch_core::error::Result;
use docsearch_core::traits::{Embedder, SearchBackend};
use docsearch_core::types::ColumnPolicy;

use crate::body::{build_body, match_all_body};
use crate::query::SearchQuery;
use crate::table::SearchResult;

pub const DEFAULT_SAMPLE_SIZE: usize = 3;

/// Run `query` and return the raw response with its tabular form.
///
/// Mode binding and body building happen before any remote call, so a
/// dense query without an embedder never reaches the service.
pub async fn execute<B: SearchBackend + ?Sized>(
    backend: &B,
    query: &SearchQuery,
    embedder: Option<&dyn Embedder>,
    policy: ColumnPolicy,
) -> Result<(Value, SearchResult)> {
    let index = query.target()?;
    let kind = query.mode.bind(embedder)?;
    let body = build_body(&kind, query)?;
    let raw = backend.search(index, &body).await?;
    let result = SearchResult::from_response(&raw, policy)?;
    debug!(
        mode = %query.mode,
        text = %query.text,
        index,
        field = %query.field,
        results = result.len(),
        "search"
    );
    Ok((raw, result))
}

/// First `size` documents of `index`, unranked.
pub async fn sample<B: SearchBackend + ?Sized>(
    backend: &B,
    index: &str,
    size: usize,
    policy: ColumnPolicy,
) -> Result<(Value, SearchResult)> {
    let raw = backend.search(index, &match_all_body(size)).await?;
    let result = SearchResult::from_response(&raw, policy)?;
    debug!(index, results = result.len(), "sample");
    Ok((raw, result))
}

/// Runs searches and keeps the last raw response and table for inspection.
#[derive(Debug, Default)]
pub struct QueryDispatcher {
    policy: ColumnPolicy,
    last_raw: Option<Value>,
    last_result: Option<SearchResult>,
}

impl QueryDispatcher {
    pub fn new(policy: ColumnPolicy) -> Self {
        Self { policy, last_raw: None, last_result: None }
    }

    pub fn policy(&self) -> ColumnPolicy {
        self.policy
    }

    pub async fn search<B: SearchBackend + ?Sized>(
        &mut self,
        backend: &B,
        query: &SearchQuery,
        embedder: Option<&dyn Embedder>,
    ) -> Result<SearchResult> {
        let (raw, result) = execute(backend, query, embedder, self.policy).await?;
        Ok(self.remember(raw, result))
    }

    pub async fn sample<B: SearchBackend + ?Sized>(&mut self, backend: &B, index: &str, size: usize) -> Result<SearchResult> {
        let (raw, result) = sample(backend, index, size, self.policy).await?;
        Ok(self.remember(raw, result))
    }

    pub fn last_raw(&self) -> Option<&Value> {
        self.last_raw.as_ref()
    }

    pub fn last_result(&self) -> Option<&SearchResult> {
        self.last_result.as_ref()
    }

    fn remember(&mut self, raw: Value, result: SearchResult) -> SearchResult {
        self.last_raw = Some(raw);
        self.last_result = Some(result.clone());
        result
    }
}
