use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::{BulkOperation, BulkOutcome};

/// Injected embedding capability.
///
/// Must be order- and length-preserving: one vector of `dim()` values per
/// input text, in input order.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// The remote search service as seen by this client.
///
/// Non-success responses surface as `Error::Remote` with the service's body
/// untouched; implementations never retry.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn ping(&self) -> Result<bool>;

    /// Fails with a 404 `Error::Remote` when the index does not exist.
    async fn delete_index(&self, index: &str) -> Result<()>;

    /// `body` is the settings + mappings document.
    async fn create_index(&self, index: &str, body: &Value) -> Result<()>;

    async fn bulk(&self, ops: &[BulkOperation]) -> Result<BulkOutcome>;

    /// Runs a query DSL body and returns the raw response.
    async fn search(&self, index: &str, body: &Value) -> Result<Value>;
}

#[async_trait]
impl<T: SearchBackend + ?Sized> SearchBackend for std::sync::Arc<T> {
    async fn ping(&self) -> Result<bool> {
        (**self).ping().await
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        (**self).delete_index(index).await
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<()> {
        (**self).create_index(index, body).await
    }

    async fn bulk(&self, ops: &[BulkOperation]) -> Result<BulkOutcome> {
        (**self).bulk(ops).await
    }

    async fn search(&self, index: &str, body: &Value) -> Result<Value> {
        (**self).search(index, body).await
    }
}
