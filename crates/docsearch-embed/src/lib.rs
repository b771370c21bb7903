//! docsearch-embed
//!
//! Embedding helpers: a deterministic [`HashEmbedder`] and [`embed_checked`],
//! which enforces the length/dimension contract of an injected embedder.

pub mod hash;

pub use hash::HashEmbedder;

use docsearch_core::error::{Error, Result};
use docsearch_core::traits::Embedder;

/// Run `embedder` over `texts` and verify one vector of `dim()` values per text.
pub fn embed_checked(embedder: &dyn Embedder, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let vectors = embedder.embed_batch(texts).map_err(Error::Embedding)?;
    if vectors.len() != texts.len() {
        return Err(Error::Data(format!(
            "embedder returned {} vectors for {} inputs",
            vectors.len(),
            texts.len()
        )));
    }
    let dim = embedder.dim();
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
        return Err(Error::Data(format!("vector {i} has {} dims, expected {dim}", v.len())));
    }
    tracing::trace!(count = vectors.len(), dim, "embedded batch");
    Ok(vectors)
}
