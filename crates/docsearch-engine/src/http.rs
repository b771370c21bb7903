use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use docsearch_core::config::EngineSettings;
use docsearch_core::error::{Error, Result};
use docsearch_core::traits::SearchBackend;
use docsearch_core::types::{BulkOperation, BulkOutcome};

use crate::bulk::{encode_ndjson, parse_bulk_response};

/// REST client for an Elasticsearch-compatible service.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::build(url.into(), None)
    }

    pub fn from_settings(settings: &EngineSettings) -> Result<Self> {
        Self::build(settings.url.clone(), settings.request_timeout_secs.map(Duration::from_secs))
    }

    fn build(url: String, timeout: Option<Duration>) -> Result<Self> {
        let base_url = url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::InvalidConfig(format!("engine url must be http(s): '{base_url}'")));
        }
        let mut builder = Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build().map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Pass 2xx responses through; anything else becomes `Error::Remote` with the body as-is.
    async fn checked(response: std::result::Result<Response, reqwest::Error>) -> Result<Response> {
        let response = response.map_err(|e| Error::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Remote { status: status.as_u16(), body })
    }

    async fn json(response: Response) -> Result<Value> {
        response.json::<Value>().await.map_err(|e| Error::Transport(e.to_string()))
    }
}

#[async_trait]
impl SearchBackend for HttpBackend {
    async fn ping(&self) -> Result<bool> {
        match self.client.get(self.url("/")).send().await {
            Ok(r) => Ok(r.status().is_success()),
            Err(e) => {
                debug!(error = %e, "ping failed");
                Ok(false)
            }
        }
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        Self::checked(self.client.delete(self.url(index)).send().await).await?;
        Ok(())
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<()> {
        Self::checked(self.client.put(self.url(index)).json(body).send().await).await?;
        Ok(())
    }

    async fn bulk(&self, ops: &[BulkOperation]) -> Result<BulkOutcome> {
        if ops.is_empty() {
            return Ok(BulkOutcome::default());
        }
        let payload = encode_ndjson(ops)?;
        debug!(ops = ops.len(), bytes = payload.len(), "bulk request");
        let response = Self::checked(
            self.client
                .post(self.url("_bulk"))
                .header(header::CONTENT_TYPE, "application/x-ndjson")
                .body(payload)
                .send()
                .await,
        )
        .await?;
        Ok(parse_bulk_response(&Self::json(response).await?, ops))
    }

    async fn search(&self, index: &str, body: &Value) -> Result<Value> {
        let response =
            Self::checked(self.client.post(self.url(&format!("{index}/_search"))).json(body).send().await).await?;
        Self::json(response).await
    }
}
