//! Single-caller convenience layer over [`Client`].
//!
//! A session remembers a default index, the path of the last spec it built,
//! and the last search response. It mutates through `&mut self`; share it
//! between tasks only behind a lock.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::info;

use docsearch_core::error::{Error, Result};
use docsearch_core::source::CsvOptions;
use docsearch_core::spec::{read_spec_file, IndexSpec, SpecBuilder};
use docsearch_core::traits::SearchBackend;
use docsearch_core::types::{BulkOutcome, Record};
use docsearch_ingest::{IngestOptions, IngestReport};
use docsearch_query::{QueryDispatcher, SearchQuery, SearchResult};

use crate::client::Client;

/// Spec/index bookkeeping of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NoIndexConfigured,
    SpecBuilt { spec_path: PathBuf },
    /// `spec_path` is the spec file still on record, if any.
    IndexCreated { index: String, spec_path: Option<PathBuf> },
}

/// Explicit spec for [`Session::create_index`].
#[derive(Debug, Clone)]
pub enum SpecSource {
    /// A settings + mappings JSON file, sent as written.
    File(PathBuf),
    Spec(IndexSpec),
}

pub struct Session<B: SearchBackend> {
    client: Client<B>,
    default_index: Option<String>,
    state: SessionState,
    dispatcher: QueryDispatcher,
}

impl<B: SearchBackend> Session<B> {
    pub fn new(client: Client<B>) -> Self {
        let dispatcher = QueryDispatcher::new(client.column_policy());
        Self { client, default_index: None, state: SessionState::NoIndexConfigured, dispatcher }
    }

    pub fn with_default_index(mut self, index: impl Into<String>) -> Self {
        self.default_index = Some(index.into());
        self
    }

    pub fn set_default_index(&mut self, index: Option<String>) {
        self.default_index = index;
    }

    pub fn default_index(&self) -> Option<&str> {
        self.default_index.as_deref()
    }

    pub fn client(&self) -> &Client<B> {
        &self.client
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Path of the last spec built by this session; never cleared.
    pub fn spec_path(&self) -> Option<&Path> {
        match &self.state {
            SessionState::NoIndexConfigured => None,
            SessionState::SpecBuilt { spec_path } => Some(spec_path),
            SessionState::IndexCreated { spec_path, .. } => spec_path.as_deref(),
        }
    }

    /// Explicit name, else the session default.
    pub fn resolve_index(&self, index: Option<&str>) -> Result<String> {
        index
            .or(self.default_index.as_deref())
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidConfig("no index given and no default index configured".to_string()))
    }

    /// Build a spec, persist it as `<folder>/spec_<index>.json` and make it
    /// the spec used by argument-less [`Session::create_index`] calls.
    pub fn build_spec(&mut self, index: Option<&str>, builder: SpecBuilder, folder: &Path) -> Result<(IndexSpec, PathBuf)> {
        let index = self.resolve_index(index)?;
        let spec = builder.build()?;
        let path = spec.persist(folder, &index)?;
        info!(index = %index, path = %path.display(), "built index spec");
        self.state = SessionState::SpecBuilt { spec_path: path.clone() };
        Ok((spec, path))
    }

    /// (Re)create an index. Destructive: an existing index of the same name
    /// is deleted with all of its documents.
    ///
    /// The spec is `spec` when given, else the last spec this session built,
    /// else [`IndexSpec::default`].
    pub async fn create_index(&mut self, index: Option<&str>, spec: Option<SpecSource>) -> Result<()> {
        let index = self.resolve_index(index)?;
        let body = match spec {
            Some(SpecSource::File(path)) => read_spec_file(&path)?,
            Some(SpecSource::Spec(spec)) => spec.to_body(),
            None => match self.spec_path() {
                Some(path) => read_spec_file(path)?,
                None => IndexSpec::default().to_body(),
            },
        };
        self.client.create_index(&index, &body).await?;
        let spec_path = self.spec_path().map(Path::to_path_buf);
        self.state = SessionState::IndexCreated { index, spec_path };
        Ok(())
    }

    pub async fn write(&self, records: Vec<Record>, index: Option<&str>, id_field: Option<&str>) -> Result<BulkOutcome> {
        let index = self.resolve_index(index)?;
        self.client.write(&index, records, id_field).await
    }

    pub async fn ingest<I>(
        &self,
        source: I,
        index: Option<&str>,
        embed_field: Option<&str>,
        options: &IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestReport>
    where
        I: Iterator<Item = Result<Vec<Record>>>,
    {
        let index = self.resolve_index(index)?;
        self.client.ingest(source, &index, embed_field, options, cancel).await
    }

    pub async fn ingest_csv(
        &self,
        path: &Path,
        csv: &CsvOptions,
        index: Option<&str>,
        embed_field: Option<&str>,
        options: &IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        let index = self.resolve_index(index)?;
        self.client.ingest_csv(path, csv, &index, embed_field, options, cancel).await
    }

    /// Search `query.index`, or the default index when it is unset.
    pub async fn search(&mut self, mut query: SearchQuery) -> Result<SearchResult> {
        if query.index.is_none() {
            query.index = Some(self.resolve_index(None)?);
        }
        let embedder = self.client.embedder().map(|e| &**e);
        self.dispatcher.search(self.client.backend(), &query, embedder).await
    }

    pub async fn sample(&mut self, index: Option<&str>, size: usize) -> Result<SearchResult> {
        let index = self.resolve_index(index)?;
        self.dispatcher.sample(self.client.backend(), &index, size).await
    }

    pub fn last_raw(&self) -> Option<&Value> {
        self.dispatcher.last_raw()
    }

    pub fn last_result(&self) -> Option<&SearchResult> {
        self.dispatcher.last_result()
    }
}
