//! docsearch-query
//!
//! Lexical and dense-vector search against an index, with hits normalized
//! into a table of `_score` plus source columns.

pub mod body;
pub mod dispatch;
pub mod query;
pub mod table;

pub use dispatch::{execute, sample, QueryDispatcher, DEFAULT_SAMPLE_SIZE};
pub use query::{QueryKind, SearchMode, SearchQuery, DEFAULT_SEARCH_SIZE};
pub use table::{Row, SearchResult};
