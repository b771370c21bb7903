//! Chunked ingestion: read a chunk, embed a field (optional), bulk write.
//!
//! Up to `concurrency` chunks are in flight; results are consumed in source
//! order, which keeps the checkpoint a contiguous prefix of the source. The
//! first failing chunk aborts the run. Cancellation stops reading new chunks,
//! lets writes already sent finish, and marks the report `cancelled`.

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use docsearch_core::error::{Error, Result};
use docsearch_core::source::{CsvChunks, CsvOptions};
use docsearch_core::traits::{Embedder, SearchBackend};
use docsearch_core::types::{embedding_key, BulkOutcome, Record};
use docsearch_embed::embed_checked;

use crate::checkpoint::Checkpoint;
use crate::writer::BulkWriter;

/// Embedder plus the field whose values it embeds.
#[derive(Clone)]
pub struct EmbedTarget {
    pub embedder: Arc<dyn Embedder>,
    pub field: String,
}

impl EmbedTarget {
    pub fn new(embedder: Arc<dyn Embedder>, field: impl Into<String>) -> Self {
        Self { embedder, field: field.into() }
    }

    /// Embedding only happens when both halves are supplied.
    pub fn from_parts(embedder: Option<Arc<dyn Embedder>>, field: Option<String>) -> Option<Self> {
        match (embedder, field) {
            (Some(embedder), Some(field)) => Some(Self { embedder, field }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckpointPolicy {
    pub path: PathBuf,
    /// Save after every N committed chunks (and always at the end).
    pub every: u64,
    /// Continue from the file at `path` instead of starting over.
    pub resume: bool,
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub id_field: Option<String>,
    pub concurrency: usize,
    pub checkpoint: Option<CheckpointPolicy>,
    pub show_progress: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self { id_field: None, concurrency: 1, checkpoint: None, show_progress: false }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Chunks written by this run.
    pub chunks: u64,
    /// Records sent by this run.
    pub documents: u64,
    pub outcome: BulkOutcome,
    pub cancelled: bool,
    /// Position reached, including what earlier runs committed.
    pub checkpoint: Checkpoint,
}

struct ChunkWritten {
    rows: u64,
    /// `None` when cancellation arrived before the chunk was sent.
    outcome: Option<BulkOutcome>,
}

pub struct Ingestor<'a, B: SearchBackend + ?Sized> {
    backend: &'a B,
}

impl<'a, B: SearchBackend + ?Sized> Ingestor<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Ingest every chunk of `source` into `index`.
    ///
    /// When resuming, the records already committed by the checkpoint are
    /// skipped from the front of `source`.
    pub async fn run<I>(
        &self,
        source: I,
        index: &str,
        embedding: Option<&EmbedTarget>,
        options: &IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestReport>
    where
        I: Iterator<Item = Result<Vec<Record>>>,
    {
        let start = starting_point(index, options)?;
        let source = skip_records(source, start.rows_committed);
        self.run_from(source, start, index, embedding, options, cancel).await
    }

    /// Ingest a delimited file. Resuming skips committed rows at the reader.
    pub async fn run_csv(
        &self,
        path: &Path,
        csv: &CsvOptions,
        index: &str,
        embedding: Option<&EmbedTarget>,
        options: &IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        let start = starting_point(index, options)?;
        let csv = CsvOptions { skip_rows: csv.skip_rows + start.rows_committed, ..csv.clone() };
        let source = CsvChunks::open(path, &csv)?;
        info!(path = %path.display(), index, skip_rows = csv.skip_rows, "ingesting csv");
        self.run_from(source, start, index, embedding, options, cancel).await
    }

    async fn run_from<I>(
        &self,
        mut source: I,
        start: Checkpoint,
        index: &str,
        embedding: Option<&EmbedTarget>,
        options: &IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestReport>
    where
        I: Iterator<Item = Result<Vec<Record>>>,
    {
        let concurrency = options.concurrency.max(1);
        let id_field = options.id_field.as_deref();
        info!(
            index,
            concurrency,
            embed_field = embedding.map(|e| e.field.as_str()),
            resumed_rows = start.rows_committed,
            "ingestion started"
        );

        let progress = progress_bar(options.show_progress);
        let reader = std::iter::from_fn(move || if cancel.is_cancelled() { None } else { source.next() });
        let mut results = stream::iter(reader)
            .enumerate()
            .map(move |(seq, chunk)| self.process_chunk(seq, chunk, index, embedding, id_field, cancel))
            .buffered(concurrency);

        let mut report = IngestReport { checkpoint: start, ..IngestReport::default() };
        let mut since_save = 0u64;
        let mut next_row = usize::try_from(report.checkpoint.rows_committed).unwrap_or(usize::MAX);
        // Set once a chunk is skipped; later chunks no longer extend the checkpoint.
        let mut gap = false;
        while let Some(result) = results.next().await {
            let written = match result {
                Ok(w) => w,
                Err(e) => {
                    progress.abandon_with_message(format!("failed after {} documents", report.documents));
                    if since_save > 0 {
                        save_checkpoint(options, &mut report.checkpoint)?;
                    }
                    return Err(e);
                }
            };
            let offset = next_row;
            next_row = next_row.saturating_add(usize::try_from(written.rows).unwrap_or(usize::MAX));
            let Some(outcome) = written.outcome else {
                gap = true;
                continue;
            };
            report.chunks += 1;
            report.documents += written.rows;
            report.outcome.absorb(outcome, offset);
            progress.set_message(format!("{} documents in {} chunks", report.documents, report.chunks));
            progress.tick();
            if gap {
                continue;
            }
            report.checkpoint.advance(written.rows);
            since_save += 1;
            if options.checkpoint.as_ref().is_some_and(|p| since_save >= p.every.max(1)) {
                save_checkpoint(options, &mut report.checkpoint)?;
                since_save = 0;
            }
        }

        report.cancelled = cancel.is_cancelled();
        if since_save > 0 {
            save_checkpoint(options, &mut report.checkpoint)?;
        }
        progress.finish_with_message(format!("{} documents in {} chunks", report.documents, report.chunks));
        if !report.outcome.is_clean() {
            warn!(index, failed = report.outcome.failures.len(), "some documents were rejected");
        }
        info!(
            index,
            chunks = report.chunks,
            documents = report.documents,
            succeeded = report.outcome.succeeded,
            cancelled = report.cancelled,
            "ingestion finished"
        );
        Ok(report)
    }

    async fn process_chunk(
        &self,
        seq: usize,
        chunk: Result<Vec<Record>>,
        index: &str,
        embedding: Option<&EmbedTarget>,
        id_field: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ChunkWritten> {
        let mut records = chunk?;
        let rows = records.len() as u64;
        if let Some(target) = embedding {
            records = attach_embeddings(target, records).await?;
        }
        if cancel.is_cancelled() {
            debug!(seq, "chunk skipped after cancellation");
            return Ok(ChunkWritten { rows, outcome: None });
        }
        let outcome = BulkWriter::new(self.backend).write(index, records, id_field).await?;
        debug!(seq, rows, succeeded = outcome.succeeded, "chunk written");
        Ok(ChunkWritten { rows, outcome: Some(outcome) })
    }
}

fn starting_point(index: &str, options: &IngestOptions) -> Result<Checkpoint> {
    match &options.checkpoint {
        Some(policy) if policy.resume => Checkpoint::resume(&policy.path, index),
        _ => Ok(Checkpoint::new(index)),
    }
}

fn save_checkpoint(options: &IngestOptions, checkpoint: &mut Checkpoint) -> Result<()> {
    match &options.checkpoint {
        Some(policy) => checkpoint.save(&policy.path),
        None => Ok(()),
    }
}

fn progress_bar(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Drop the first `rows` records of a chunked source, trimming the chunk
/// that straddles the boundary.
fn skip_records<I>(mut source: I, rows: u64) -> impl Iterator<Item = Result<Vec<Record>>>
where
    I: Iterator<Item = Result<Vec<Record>>>,
{
    let mut remaining = usize::try_from(rows).unwrap_or(usize::MAX);
    std::iter::from_fn(move || loop {
        let chunk = source.next()?;
        if remaining == 0 {
            return Some(chunk);
        }
        match chunk {
            Ok(records) if records.len() <= remaining => remaining -= records.len(),
            Ok(mut records) => {
                records.drain(..remaining);
                remaining = 0;
                return Some(Ok(records));
            }
            Err(e) => return Some(Err(e)),
        }
    })
}

/// Text embedded for a record: scalars in string form, null as "".
fn embed_input(record: &Record, field: &str) -> Result<String> {
    match record.get(field) {
        None => Err(Error::Data(format!("embed field '{field}' is missing"))),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(Value::Null) => Ok(String::new()),
        Some(other) => Err(Error::Data(format!("embed field '{field}' holds a non-scalar value: {other}"))),
    }
}

async fn attach_embeddings(target: &EmbedTarget, mut records: Vec<Record>) -> Result<Vec<Record>> {
    if records.is_empty() {
        return Ok(records);
    }
    let texts = records.iter().map(|r| embed_input(r, &target.field)).collect::<Result<Vec<_>>>()?;
    let embedder = Arc::clone(&target.embedder);
    let vectors = tokio::task::spawn_blocking(move || embed_checked(embedder.as_ref(), &texts))
        .await
        .map_err(|e| Error::Embedding(anyhow::Error::new(e)))??;
    let key = embedding_key(&target.field);
    for (record, vector) in records.iter_mut().zip(vectors) {
        record.insert(key.clone(), json!(vector));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(ids: std::ops::Range<i64>) -> Result<Vec<Record>> {
        Ok(ids.map(|i| json!({ "id": i }).as_object().cloned().unwrap()).collect())
    }

    fn ids(chunks: Vec<Result<Vec<Record>>>) -> Vec<Vec<i64>> {
        chunks
            .into_iter()
            .map(|c| c.unwrap().iter().map(|r| r["id"].as_i64().unwrap()).collect())
            .collect()
    }

    #[test]
    fn skip_trims_the_straddling_chunk() {
        let source = vec![chunk(0..3), chunk(3..6), chunk(6..7)];
        let out: Vec<_> = skip_records(source.into_iter(), 4).collect();
        assert_eq!(ids(out), vec![vec![4, 5], vec![6]]);
    }

    #[test]
    fn skip_on_a_boundary_and_past_the_end() {
        let out: Vec<_> = skip_records(vec![chunk(0..3), chunk(3..6)].into_iter(), 3).collect();
        assert_eq!(ids(out), vec![vec![3, 4, 5]]);
        assert_eq!(skip_records(vec![chunk(0..3)].into_iter(), 10).count(), 0);
    }

    #[test]
    fn embed_input_forms() {
        let record = json!({"s": "red", "n": 3, "b": false, "z": null, "o": {"a": 1}});
        let record = record.as_object().unwrap();
        assert_eq!(embed_input(record, "s").unwrap(), "red");
        assert_eq!(embed_input(record, "n").unwrap(), "3");
        assert_eq!(embed_input(record, "b").unwrap(), "false");
        assert_eq!(embed_input(record, "z").unwrap(), "");
        assert!(matches!(embed_input(record, "o"), Err(Error::Data(_))));
        assert!(matches!(embed_input(record, "missing"), Err(Error::Data(_))));
    }
}
