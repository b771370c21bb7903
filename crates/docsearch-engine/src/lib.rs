//! docsearch-engine
//!
//! Implementations of [`docsearch_core::traits::SearchBackend`]: [`HttpBackend`]
//! talks to an Elasticsearch-compatible REST service, [`MemoryBackend`] keeps
//! everything in process.

pub mod bulk;
pub mod http;
pub mod matching;
pub mod memory;

pub use http::HttpBackend;
pub use memory::{CallCounts, MemoryBackend};
