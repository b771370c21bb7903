use std::io::Write;
use std::sync::Arc;

use docsearch_core::error::Error;
use docsearch_core::source::{chunked, CsvOptions};
use docsearch_core::traits::Embedder;
use docsearch_core::types::Record;
use docsearch_embed::HashEmbedder;
use docsearch_engine::MemoryBackend;
use docsearch_ingest::{Checkpoint, CheckpointPolicy, EmbedTarget, IngestOptions, Ingestor};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn rows(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| json!({"item_id": i, "title": format!("item number {i}")}).as_object().cloned().unwrap())
        .collect()
}

fn with_ids() -> IngestOptions {
    IngestOptions { id_field: Some("item_id".into()), ..IngestOptions::default() }
}

#[tokio::test]
async fn bulk_calls_are_ceil_of_rows_over_chunk_size() -> anyhow::Result<()> {
    let c = 4;
    for s in [0, 1, c, c + 1, 3 * c] {
        let backend = MemoryBackend::new();
        let report = Ingestor::new(&backend)
            .run(chunked(rows(s), c)?, "items", None, &with_ids(), &CancellationToken::new())
            .await?;
        assert_eq!(backend.calls().bulk, s.div_ceil(c), "rows = {s}");
        assert_eq!(backend.doc_count("items"), s, "rows = {s}");
        assert_eq!(report.documents, s as u64);
        assert_eq!(report.outcome.succeeded, s);
        assert!(!report.cancelled);
    }
    Ok(())
}

#[tokio::test]
async fn concurrent_chunks_still_write_everything() -> anyhow::Result<()> {
    let backend = MemoryBackend::new();
    let options = IngestOptions { concurrency: 3, ..with_ids() };
    let report = Ingestor::new(&backend)
        .run(chunked(rows(25), 4)?, "items", None, &options, &CancellationToken::new())
        .await?;
    assert_eq!(report.chunks, 7);
    assert_eq!(report.checkpoint.rows_committed, 25);
    assert_eq!(backend.doc_count("items"), 25);
    Ok(())
}

#[tokio::test]
async fn embedder_attaches_vectors_of_declared_dimension() -> anyhow::Result<()> {
    let backend = MemoryBackend::new();
    let target = EmbedTarget::new(Arc::new(HashEmbedder::new(16)), "title");
    Ingestor::new(&backend)
        .run(chunked(rows(5), 2)?, "items", Some(&target), &with_ids(), &CancellationToken::new())
        .await?;
    for (_, doc) in backend.documents("items") {
        let vector = doc["title_embedding"].as_array().expect("vector");
        assert_eq!(vector.len(), 16);
    }
    Ok(())
}

#[tokio::test]
async fn no_embedding_without_both_embedder_and_field() -> anyhow::Result<()> {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(8));
    assert!(EmbedTarget::from_parts(Some(embedder.clone()), None).is_none());
    assert!(EmbedTarget::from_parts(None, Some("title".into())).is_none());

    let backend = MemoryBackend::new();
    let target = EmbedTarget::from_parts(Some(embedder), None);
    Ingestor::new(&backend)
        .run(chunked(rows(3), 2)?, "items", target.as_ref(), &with_ids(), &CancellationToken::new())
        .await?;
    for (_, doc) in backend.documents("items") {
        assert!(doc.get("title_embedding").is_none());
    }
    Ok(())
}

struct BrokenEmbedder;

impl Embedder for BrokenEmbedder {
    fn dim(&self) -> usize {
        4
    }

    fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("model offline")
    }
}

#[tokio::test]
async fn embedding_failure_aborts_before_writing() {
    let backend = MemoryBackend::new();
    let target = EmbedTarget::new(Arc::new(BrokenEmbedder), "title");
    let err = Ingestor::new(&backend)
        .run(chunked(rows(3), 2).unwrap(), "items", Some(&target), &with_ids(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Embedding(_)), "got {err:?}");
    assert_eq!(backend.calls().bulk, 0);
}

#[tokio::test]
async fn data_error_in_a_later_chunk_keeps_earlier_progress() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cp_path = dir.path().join("items.checkpoint.json");
    let mut records = rows(6);
    records[4].remove("item_id");

    let backend = MemoryBackend::new();
    let options = IngestOptions {
        checkpoint: Some(CheckpointPolicy { path: cp_path.clone(), every: 100, resume: false }),
        ..with_ids()
    };
    let err = Ingestor::new(&backend)
        .run(chunked(records, 2)?, "items", None, &options, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Data(_)));
    assert_eq!(backend.calls().bulk, 2);

    let saved = Checkpoint::load(&cp_path)?.expect("checkpoint saved on abort");
    assert_eq!(saved.chunks_committed, 2);
    assert_eq!(saved.rows_committed, 4);
    Ok(())
}

#[tokio::test]
async fn cancelled_before_start_reads_nothing() -> anyhow::Result<()> {
    let backend = MemoryBackend::new();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = Ingestor::new(&backend).run(chunked(rows(10), 3)?, "items", None, &with_ids(), &cancel).await?;
    assert!(report.cancelled);
    assert_eq!(report.chunks, 0);
    assert_eq!(backend.calls().total(), 0);
    Ok(())
}

#[tokio::test]
async fn cancellation_mid_run_stops_at_a_chunk_boundary() -> anyhow::Result<()> {
    let backend = MemoryBackend::new();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let mut inner = chunked(rows(10), 3)?.enumerate();
    // Cancels while handing out the second chunk.
    let source = std::iter::from_fn(move || {
        let (i, chunk) = inner.next()?;
        if i == 1 {
            trigger.cancel();
        }
        Some(chunk)
    });
    let report = Ingestor::new(&backend).run(source, "items", None, &with_ids(), &cancel).await?;
    assert!(report.cancelled);
    assert_eq!(report.chunks, 1);
    assert_eq!(report.checkpoint.rows_committed, 3);
    assert_eq!(backend.calls().bulk, 1);
    assert_eq!(backend.doc_count("items"), 3);
    Ok(())
}

#[tokio::test]
async fn resume_continues_after_committed_rows() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cp_path = dir.path().join("cp.json");
    let mut checkpoint = Checkpoint { index: "items".into(), chunks_committed: 2, rows_committed: 6, updated_at: None };
    checkpoint.save(&cp_path)?;

    let backend = MemoryBackend::new();
    let options = IngestOptions {
        checkpoint: Some(CheckpointPolicy { path: cp_path.clone(), every: 1, resume: true }),
        ..with_ids()
    };
    let report = Ingestor::new(&backend)
        .run(chunked(rows(10), 3)?, "items", None, &options, &CancellationToken::new())
        .await?;
    assert_eq!(report.documents, 4);
    assert_eq!(backend.doc_count("items"), 4);
    assert!(backend.document("items", "5").is_none());
    assert!(backend.document("items", "6").is_some());

    let saved = Checkpoint::load(&cp_path)?.unwrap();
    assert_eq!(saved.rows_committed, 10);
    assert_eq!(saved.chunks_committed, 4);
    assert!(saved.updated_at.is_some());
    Ok(())
}

#[tokio::test]
async fn resume_rejects_a_checkpoint_for_another_index() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cp_path = dir.path().join("cp.json");
    Checkpoint::new("other").save(&cp_path)?;
    let options = IngestOptions {
        checkpoint: Some(CheckpointPolicy { path: cp_path, every: 1, resume: true }),
        ..with_ids()
    };
    let backend = MemoryBackend::new();
    let err = Ingestor::new(&backend)
        .run(chunked(rows(1), 1)?, "items", None, &options, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
    assert_eq!(backend.calls().total(), 0);
    Ok(())
}

#[tokio::test]
async fn csv_ingest_and_resume_skip_at_the_reader() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let csv_path = dir.path().join("items.csv");
    let mut file = std::fs::File::create(&csv_path)?;
    writeln!(file, "item_id,title,price")?;
    for i in 0..7 {
        writeln!(file, "{i},product {i},{}.5", i + 1)?;
    }
    drop(file);

    let cp_path = dir.path().join("cp.json");
    let csv = CsvOptions { chunk_size: 3, ..CsvOptions::default() };
    let options = IngestOptions {
        checkpoint: Some(CheckpointPolicy { path: cp_path.clone(), every: 1, resume: true }),
        ..with_ids()
    };

    let backend = MemoryBackend::new();
    let ingestor = Ingestor::new(&backend);
    let first = ingestor.run_csv(&csv_path, &csv, "items", None, &options, &CancellationToken::new()).await?;
    assert_eq!(first.chunks, 3);
    assert_eq!(backend.doc_count("items"), 7);
    assert_eq!(backend.document("items", "2").unwrap()["price"], json!(3.5));

    // Everything is committed, so a resumed run has nothing left to send.
    let second = ingestor.run_csv(&csv_path, &csv, "items", None, &options, &CancellationToken::new()).await?;
    assert_eq!(second.chunks, 0);
    assert_eq!(second.checkpoint.rows_committed, 7);
    assert_eq!(backend.calls().bulk, 3);
    Ok(())
}

#[tokio::test]
async fn long_numeric_csv_ids_stay_distinct() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let csv_path = dir.path().join("ids.csv");
    std::fs::write(&csv_path, "item_id,title\n12345678901234567891,first\n12345678901234567892,second\n")?;

    let backend = MemoryBackend::new();
    let report = Ingestor::new(&backend)
        .run_csv(&csv_path, &CsvOptions::default(), "items", None, &with_ids(), &CancellationToken::new())
        .await?;
    assert_eq!(report.documents, 2);
    assert_eq!(backend.doc_count("items"), 2);
    assert_eq!(backend.document("items", "12345678901234567891").unwrap()["title"], json!("first"));
    assert_eq!(backend.document("items", "12345678901234567892").unwrap()["title"], json!("second"));
    Ok(())
}

#[tokio::test]
async fn rejected_rows_are_reported_by_input_position() -> anyhow::Result<()> {
    let backend = MemoryBackend::new();
    let mapping = json!({"mappings": {"properties": {"v": {"type": "dense_vector", "dims": 2}}}});
    docsearch_ingest::IndexManager::new(&backend).create_index("items", &mapping).await?;
    let mut records = rows(7);
    for record in &mut records {
        record.insert("v".into(), json!([1.0, 0.0]));
    }
    records[1].insert("v".into(), json!([1.0]));
    records[4].insert("v".into(), json!([1.0]));

    let report = Ingestor::new(&backend)
        .run(chunked(records, 3)?, "items", None, &with_ids(), &CancellationToken::new())
        .await?;
    assert_eq!(report.outcome.succeeded, 5);
    let positions: Vec<usize> = report.outcome.failures.iter().map(|f| f.position).collect();
    assert_eq!(positions, vec![1, 4]);
    assert_eq!(report.outcome.failures[1].id.as_deref(), Some("4"));
    Ok(())
}
