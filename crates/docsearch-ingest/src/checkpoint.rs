//! Resume position of an ingestion run.
//!
//! The checkpoint only ever covers a contiguous prefix of the source: chunks
//! `0..chunks_committed`, holding `rows_committed` records, were written.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use docsearch_core::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub index: String,
    pub chunks_committed: u64,
    pub rows_committed: u64,
    /// RFC 3339 time of the last save.
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Checkpoint {
    pub fn new(index: &str) -> Self {
        Self { index: index.to_string(), ..Self::default() }
    }

    /// `Ok(None)` when no checkpoint file exists yet.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Load the checkpoint for `index`, or start fresh when there is none.
    pub fn resume(path: &Path, index: &str) -> Result<Self> {
        match Self::load(path)? {
            Some(cp) if cp.index == index => Ok(cp),
            Some(cp) => Err(Error::InvalidConfig(format!(
                "checkpoint {} belongs to index '{}', not '{index}'",
                path.display(),
                cp.index
            ))),
            None => Ok(Self::new(index)),
        }
    }

    /// Written to a sibling temp file, then renamed into place.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        self.updated_at = Some(chrono::Utc::now().to_rfc3339());
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), chunks = self.chunks_committed, rows = self.rows_committed, "saved checkpoint");
        Ok(())
    }

    pub fn advance(&mut self, rows: u64) {
        self.chunks_committed += 1;
        self.rows_committed += rows;
    }
}
