use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use docsearch_client::{Client, Session, SpecSource};
use docsearch_core::config::Settings;
use docsearch_core::source::CsvOptions;
use docsearch_core::spec::{spec_file_name, FieldType, IndexSpec};
use docsearch_core::traits::Embedder;
use docsearch_core::types::{embedding_key, BulkOutcome};
use docsearch_embed::HashEmbedder;
use docsearch_engine::HttpBackend;
use docsearch_ingest::{CheckpointPolicy, IngestOptions};
use docsearch_query::{SearchMode, SearchQuery};

use crate::records::read_records;

/// Settings plus a session over the configured service.
pub struct Context {
    settings: Settings,
    session: Session<HttpBackend>,
}

impl Context {
    pub fn new(settings: Settings) -> Result<Self> {
        let dims = settings.index.dense_dims;
        Self::build(settings, dims)
    }

    fn build(settings: Settings, dims: usize) -> Result<Self> {
        let backend = HttpBackend::from_settings(&settings.engine)?;
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(dims));
        let client = Client::new(backend).with_embedder(embedder).with_column_policy(settings.search.columns);
        let mut session = Session::new(client);
        session.set_default_index(settings.index.default.clone());
        Ok(Self { settings, session })
    }

    /// Rebuild with an embedder sized for `field` of `index`. Only called
    /// before the session has done anything.
    fn sized_for(self, index: &str, field: &str, flag: Option<usize>) -> Result<Self> {
        let dims = dense_dims(&self.settings, index, field, flag);
        if dims == self.settings.index.dense_dims {
            return Ok(self);
        }
        debug!(index, field, dims, "embedding width from index spec");
        Self::build(self.settings, dims)
    }
}

/// Embedding width for `field` of `index`: the `--dims` flag, else the
/// mapping recorded in `<spec_dir>/spec_<index>.json`, else `index.dense_dims`.
pub fn dense_dims(settings: &Settings, index: &str, field: &str, flag: Option<usize>) -> usize {
    if let Some(dims) = flag {
        return dims;
    }
    let path = settings.index.spec_dir_path().join(spec_file_name(index));
    if path.exists() {
        match IndexSpec::load(&path) {
            Ok(spec) => {
                if let Some(FieldType::DenseVector { dims }) = spec.fields.get(&embedding_key(field)) {
                    return *dims;
                }
            }
            Err(e) => warn!(path = %path.display(), error = %e, "unreadable spec file, using index.dense_dims"),
        }
    }
    settings.index.dense_dims
}

pub struct SpecFields {
    pub text: Vec<String>,
    pub keyword: Vec<String>,
    pub dense: Vec<String>,
    pub dims: Option<usize>,
    pub shards: Option<u32>,
    pub replicas: Option<u32>,
}

pub struct IngestArgs {
    pub file: PathBuf,
    pub index: Option<String>,
    pub id_field: Option<String>,
    pub embed_field: Option<String>,
    pub chunk_size: Option<usize>,
    pub concurrency: Option<usize>,
    pub delimiter: Option<char>,
    pub index_column: bool,
    pub checkpoint: Option<PathBuf>,
    pub resume: bool,
    pub no_progress: bool,
    pub dims: Option<usize>,
}

pub async fn ping(ctx: &Context) -> Result<()> {
    let url = &ctx.settings.engine.url;
    if ctx.session.client().ping().await? {
        println!("{url} is up");
        Ok(())
    } else {
        bail!("{url} did not answer")
    }
}

pub fn spec(mut ctx: Context, index: Option<String>, fields: SpecFields, folder: Option<PathBuf>) -> Result<()> {
    let defaults = &ctx.settings.index;
    let builder = IndexSpec::builder()
        .text_fields(fields.text)
        .keyword_fields(fields.keyword)
        .dense_fields(fields.dense, fields.dims.unwrap_or(defaults.dense_dims))
        .shards(fields.shards.unwrap_or(defaults.shards))
        .replicas(fields.replicas.unwrap_or(defaults.replicas));
    let folder = folder.unwrap_or_else(|| defaults.spec_dir_path());
    let (spec, path) = ctx.session.build_spec(index.as_deref(), builder, &folder)?;
    println!("wrote {} ({} fields)", path.display(), spec.fields.len());
    Ok(())
}

pub async fn create_index(mut ctx: Context, index: Option<String>, spec: Option<PathBuf>) -> Result<()> {
    let index = ctx.session.resolve_index(index.as_deref())?;
    let source = match spec {
        Some(path) => Some(SpecSource::File(path)),
        None => {
            let built = ctx.settings.index.spec_dir_path().join(spec_file_name(&index));
            built.exists().then_some(SpecSource::File(built))
        }
    };
    match &source {
        Some(SpecSource::File(path)) => info!(index = %index, spec = %path.display(), "recreating index"),
        _ => info!(index = %index, "recreating index with default settings"),
    }
    ctx.session.create_index(Some(&index), source).await?;
    println!("created index '{index}'");
    Ok(())
}

pub async fn write(ctx: Context, file: &Path, index: Option<String>, id_field: Option<String>) -> Result<()> {
    let records = read_records(file)?;
    let count = records.len();
    let outcome = ctx.session.write(records, index.as_deref(), id_field.as_deref()).await?;
    println!("wrote {} of {count} records", outcome.succeeded);
    report_failures(&outcome)
}

pub async fn ingest(ctx: Context, args: IngestArgs) -> Result<()> {
    let index = ctx.session.resolve_index(args.index.as_deref())?;
    let embed_field = args.embed_field.clone().or_else(|| ctx.settings.ingest.embed_field.clone());
    let ctx = match &embed_field {
        Some(field) => ctx.sized_for(&index, field, args.dims)?,
        None => ctx,
    };
    let defaults = &ctx.settings.ingest;
    let delimiter = args.delimiter.unwrap_or(defaults.delimiter);
    if !delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character, got '{delimiter}'");
    }
    let csv = CsvOptions {
        chunk_size: args.chunk_size.unwrap_or(defaults.chunk_size),
        delimiter: delimiter as u8,
        index_column: args.index_column || defaults.index_column,
        skip_rows: 0,
    };
    let checkpoint = args.checkpoint.unwrap_or_else(|| default_checkpoint_path(&args.file, &index));
    let options = IngestOptions {
        id_field: args.id_field.or_else(|| defaults.id_field.clone()),
        concurrency: args.concurrency.unwrap_or(defaults.concurrency),
        checkpoint: Some(CheckpointPolicy { path: checkpoint, every: defaults.checkpoint_every, resume: args.resume }),
        show_progress: defaults.show_progress && !args.no_progress,
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight chunks");
            on_signal.cancel();
        }
    });

    let report = ctx
        .session
        .ingest_csv(&args.file, &csv, Some(&index), embed_field.as_deref(), &options, &cancel)
        .await?;
    println!(
        "ingested {} documents in {} chunks into '{index}' ({} rows committed overall)",
        report.documents, report.chunks, report.checkpoint.rows_committed
    );
    if report.cancelled {
        println!("interrupted; rerun with --resume to continue");
    }
    report_failures(&report.outcome)
}

#[allow(clippy::too_many_arguments)]
pub async fn search(
    ctx: Context,
    field: String,
    text: String,
    index: Option<String>,
    mode: &str,
    size: Option<usize>,
    dims: Option<usize>,
    raw: bool,
) -> Result<()> {
    let mode: SearchMode = mode.parse()?;
    let mut ctx = if mode == SearchMode::Dense {
        let target = ctx.session.resolve_index(index.as_deref())?;
        ctx.sized_for(&target, &field, dims)?
    } else {
        ctx
    };
    let mut query = SearchQuery::new(field, text).mode(mode).size(size.unwrap_or(ctx.settings.search.size));
    query.index = index;
    let result = ctx.session.search(query).await?;
    match ctx.session.last_raw() {
        Some(response) if raw => println!("{}", serde_json::to_string_pretty(response)?),
        _ => print!("{result}"),
    }
    Ok(())
}

pub async fn sample(mut ctx: Context, index: Option<String>, size: usize) -> Result<()> {
    let result = ctx.session.sample(index.as_deref(), size).await?;
    print!("{result}");
    Ok(())
}

/// `<file stem>.<index>.checkpoint.json` next to the input file.
pub fn default_checkpoint_path(file: &Path, index: &str) -> PathBuf {
    file.with_extension(format!("{index}.checkpoint.json"))
}

fn report_failures(outcome: &BulkOutcome) -> Result<()> {
    if outcome.is_clean() {
        return Ok(());
    }
    for failure in outcome.failures.iter().take(5) {
        eprintln!(
            "  rejected #{} id={} status={}: {}",
            failure.position,
            failure.id.as_deref().unwrap_or("-"),
            failure.status,
            failure.reason
        );
    }
    bail!("{} documents were rejected", outcome.failures.len())
}
