//! docsearch-ingest
//!
//! Getting documents into the search service: destructive index (re)creation,
//! bulk writes keyed by an optional id field, and the chunked, resumable
//! ingestion pipeline with optional embedding injection.

pub mod checkpoint;
pub mod index;
pub mod pipeline;
pub mod writer;

pub use checkpoint::Checkpoint;
pub use index::IndexManager;
pub use pipeline::{CheckpointPolicy, EmbedTarget, IngestOptions, IngestReport, Ingestor};
pub use writer::BulkWriter;
