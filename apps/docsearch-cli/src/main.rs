use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docsearch_core::config::Config;

mod commands;
mod logging;
mod records;

#[derive(Parser)]
#[command(name = "docsearch")]
#[command(about = "Index, ingest and search documents in an Elasticsearch-compatible service")]
#[command(version)]
struct Cli {
    /// TOML config file (default: config.toml + config.<RUST_ENV>.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Search service URL, overriding `engine.url`
    #[arg(long, global = true)]
    url: Option<String>,

    /// More console output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the service answers
    Ping,

    /// Build an index spec and write it to the spec folder
    Spec {
        #[arg(long)]
        index: Option<String>,
        /// Full-text fields
        #[arg(long, value_delimiter = ',')]
        text: Vec<String>,
        /// Exact-match fields
        #[arg(long, value_delimiter = ',')]
        keyword: Vec<String>,
        /// Vector fields (usually `<field>_embedding`)
        #[arg(long, value_delimiter = ',')]
        dense: Vec<String>,
        #[arg(long)]
        dims: Option<usize>,
        #[arg(long)]
        shards: Option<u32>,
        #[arg(long)]
        replicas: Option<u32>,
        /// Output folder (default: `index.spec_dir`)
        #[arg(long)]
        folder: Option<PathBuf>,
    },

    /// Delete and recreate an index. All of its documents are lost.
    CreateIndex {
        #[arg(long)]
        index: Option<String>,
        /// Spec file; defaults to `spec_<index>.json` in the spec folder when present
        #[arg(long)]
        spec: Option<PathBuf>,
    },

    /// Bulk write records from a JSON array or NDJSON file
    Write {
        file: PathBuf,
        #[arg(long)]
        index: Option<String>,
        #[arg(long)]
        id_field: Option<String>,
    },

    /// Ingest a delimited file in chunks
    Ingest {
        file: PathBuf,
        #[arg(long)]
        index: Option<String>,
        /// Document id column (e.g. `item_id`)
        #[arg(long)]
        id_field: Option<String>,
        /// Column to embed into `<column>_embedding`
        #[arg(long)]
        embed_field: Option<String>,
        #[arg(long)]
        chunk_size: Option<usize>,
        #[arg(long)]
        concurrency: Option<usize>,
        #[arg(long)]
        delimiter: Option<char>,
        /// First column is a row index and is not indexed
        #[arg(long)]
        index_column: bool,
        /// Checkpoint file (default: `<file>.<index>.checkpoint.json`)
        #[arg(long)]
        checkpoint: Option<PathBuf>,
        /// Continue after the rows the checkpoint has committed
        #[arg(long)]
        resume: bool,
        #[arg(long)]
        no_progress: bool,
        /// Embedding width (default: the index's recorded spec, else `index.dense_dims`)
        #[arg(long)]
        dims: Option<usize>,
    },

    /// Search one field
    Search {
        field: String,
        text: String,
        #[arg(long)]
        index: Option<String>,
        /// match, term, fuzzy, wildcard or dense
        #[arg(long, default_value = "match")]
        mode: String,
        #[arg(long)]
        size: Option<usize>,
        /// Embedding width for dense mode (default: the index's recorded spec)
        #[arg(long)]
        dims: Option<usize>,
        /// Print the raw response instead of a table
        #[arg(long)]
        raw: bool,
    },

    /// Show a few documents of an index
    Sample {
        #[arg(long)]
        index: Option<String>,
        #[arg(long, default_value_t = docsearch_query::DEFAULT_SAMPLE_SIZE)]
        size: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    }
    .map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let mut settings = config.settings()?;
    if let Some(url) = cli.url {
        settings.engine.url = url;
    }
    let _guard = logging::init(&settings.log, cli.verbose)?;

    let ctx = commands::Context::new(settings)?;
    match cli.command {
        Commands::Ping => commands::ping(&ctx).await,
        Commands::Spec { index, text, keyword, dense, dims, shards, replicas, folder } => {
            let fields = commands::SpecFields { text, keyword, dense, dims, shards, replicas };
            commands::spec(ctx, index, fields, folder)
        }
        Commands::CreateIndex { index, spec } => commands::create_index(ctx, index, spec).await,
        Commands::Write { file, index, id_field } => commands::write(ctx, &file, index, id_field).await,
        Commands::Ingest {
            file,
            index,
            id_field,
            embed_field,
            chunk_size,
            concurrency,
            delimiter,
            index_column,
            checkpoint,
            resume,
            no_progress,
            dims,
        } => {
            let args = commands::IngestArgs {
                file,
                index,
                id_field,
                embed_field,
                chunk_size,
                concurrency,
                delimiter,
                index_column,
                checkpoint,
                resume,
                no_progress,
                dims,
            };
            commands::ingest(ctx, args).await
        }
        Commands::Search { field, text, index, mode, size, dims, raw } => {
            commands::search(ctx, field, text, index, &mode, size, dims, raw).await
        }
        Commands::Sample { index, size } => commands::sample(ctx, index, size).await,
    }
}
