use serde_json::Value;
use tracing::{debug, info};

use docsearch_core::error::Result;
use docsearch_core::spec::IndexSpec;
use docsearch_core::traits::SearchBackend;

/// Index lifecycle against a search service.
pub struct IndexManager<'a, B: SearchBackend + ?Sized> {
    backend: &'a B,
}

impl<'a, B: SearchBackend + ?Sized> IndexManager<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Create `index` from a settings + mappings body.
    ///
    /// Destructive: an existing index of the same name is deleted first,
    /// together with all of its documents. A missing index is not an error;
    /// any other remote failure is returned unchanged.
    pub async fn create_index(&self, index: &str, body: &Value) -> Result<()> {
        let existed = self.delete_index(index).await?;
        self.backend.create_index(index, body).await?;
        info!(index, replaced = existed, "created index");
        Ok(())
    }

    pub async fn create_from_spec(&self, index: &str, spec: &IndexSpec) -> Result<()> {
        self.create_index(index, &spec.to_body()).await
    }

    /// Delete `index`; `Ok(false)` when there was nothing to delete.
    pub async fn delete_index(&self, index: &str) -> Result<bool> {
        match self.backend.delete_index(index).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => {
                debug!(index, "no existing index to delete");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
