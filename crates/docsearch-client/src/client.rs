use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use docsearch_core::error::Result;
use docsearch_core::source::CsvOptions;
use docsearch_core::spec::IndexSpec;
use docsearch_core::traits::{Embedder, SearchBackend};
use docsearch_core::types::{BulkOutcome, ColumnPolicy, Record};
use docsearch_ingest::{BulkWriter, EmbedTarget, IndexManager, IngestOptions, IngestReport, Ingestor};
use docsearch_query::{dispatch, SearchQuery, SearchResult};

/// Search service client with an optional embedder.
#[derive(Clone)]
pub struct Client<B: SearchBackend> {
    backend: B,
    embedder: Option<Arc<dyn Embedder>>,
    policy: ColumnPolicy,
}

impl<B: SearchBackend> Client<B> {
    pub fn new(backend: B) -> Self {
        Self { backend, embedder: None, policy: ColumnPolicy::default() }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_column_policy(mut self, policy: ColumnPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn embedder(&self) -> Option<&Arc<dyn Embedder>> {
        self.embedder.as_ref()
    }

    pub fn column_policy(&self) -> ColumnPolicy {
        self.policy
    }

    pub async fn ping(&self) -> Result<bool> {
        self.backend.ping().await
    }

    /// Destructive: drops any existing `index` and its documents first.
    pub async fn create_index(&self, index: &str, body: &Value) -> Result<()> {
        IndexManager::new(&self.backend).create_index(index, body).await
    }

    /// Destructive, as [`Client::create_index`].
    pub async fn create_index_from_spec(&self, index: &str, spec: &IndexSpec) -> Result<()> {
        IndexManager::new(&self.backend).create_from_spec(index, spec).await
    }

    pub async fn write(&self, index: &str, records: Vec<Record>, id_field: Option<&str>) -> Result<BulkOutcome> {
        BulkWriter::new(&self.backend).write(index, records, id_field).await
    }

    /// Chunked ingestion; `embed_field` is embedded only when the client has an embedder.
    pub async fn ingest<I>(
        &self,
        source: I,
        index: &str,
        embed_field: Option<&str>,
        options: &IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestReport>
    where
        I: Iterator<Item = Result<Vec<Record>>>,
    {
        let target = self.embed_target(embed_field);
        Ingestor::new(&self.backend).run(source, index, target.as_ref(), options, cancel).await
    }

    pub async fn ingest_csv(
        &self,
        path: &Path,
        csv: &CsvOptions,
        index: &str,
        embed_field: Option<&str>,
        options: &IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        let target = self.embed_target(embed_field);
        Ingestor::new(&self.backend).run_csv(path, csv, index, target.as_ref(), options, cancel).await
    }

    /// `query.index` must be set.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResult> {
        Ok(self.search_raw(query).await?.1)
    }

    pub async fn search_raw(&self, query: &SearchQuery) -> Result<(Value, SearchResult)> {
        dispatch::execute(&self.backend, query, self.embedder.as_deref(), self.policy).await
    }

    pub async fn sample(&self, index: &str, size: usize) -> Result<SearchResult> {
        Ok(dispatch::sample(&self.backend, index, size, self.policy).await?.1)
    }

    fn embed_target(&self, field: Option<&str>) -> Option<EmbedTarget> {
        EmbedTarget::from_parts(self.embedder.clone(), field.map(str::to_string))
    }
}
