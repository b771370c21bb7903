use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Non-success response from the search service, body kept verbatim.
    #[error("Remote service returned {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Embedding failed: {0}")]
    Embedding(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl Error {
    /// True for a 404 from the remote service or a local `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Remote { status: 404, .. } | Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
