use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use docsearch_core::error::{Error, Result};
use docsearch_core::traits::Embedder;

pub const DEFAULT_SEARCH_SIZE: usize = 10;

/// Query type tag as accepted from callers (`"match"`, `"dense"`, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Match,
    Term,
    Fuzzy,
    /// Pattern with `*` / `?`, passed to the service as given.
    Wildcard,
    /// Cosine similarity against `<field>_embedding`.
    Dense,
}

impl SearchMode {
    pub const ALL: [SearchMode; 5] =
        [SearchMode::Match, SearchMode::Term, SearchMode::Fuzzy, SearchMode::Wildcard, SearchMode::Dense];

    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Match => "match",
            SearchMode::Term => "term",
            SearchMode::Fuzzy => "fuzzy",
            SearchMode::Wildcard => "wildcard",
            SearchMode::Dense => "dense",
        }
    }

    /// Pair the mode with what it needs to run. Dense without an embedder
    /// is a configuration error.
    pub fn bind(self, embedder: Option<&dyn Embedder>) -> Result<QueryKind<'_>> {
        Ok(match self {
            SearchMode::Match => QueryKind::Match,
            SearchMode::Term => QueryKind::Term,
            SearchMode::Fuzzy => QueryKind::Fuzzy,
            SearchMode::Wildcard => QueryKind::Wildcard,
            SearchMode::Dense => QueryKind::Dense(embedder.ok_or_else(|| {
                Error::InvalidConfig("dense search requires an embedder".to_string())
            })?),
        })
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        SearchMode::ALL.into_iter().find(|m| m.as_str() == lowered).ok_or_else(|| {
            Error::InvalidConfig(format!("unknown search mode '{s}' (expected match, term, fuzzy, wildcard or dense)"))
        })
    }
}

/// A mode bound to its execution requirements.
#[derive(Clone, Copy)]
pub enum QueryKind<'e> {
    Match,
    Term,
    Fuzzy,
    Wildcard,
    Dense(&'e dyn Embedder),
}

impl QueryKind<'_> {
    pub fn mode(&self) -> SearchMode {
        match self {
            QueryKind::Match => SearchMode::Match,
            QueryKind::Term => SearchMode::Term,
            QueryKind::Fuzzy => SearchMode::Fuzzy,
            QueryKind::Wildcard => SearchMode::Wildcard,
            QueryKind::Dense(_) => SearchMode::Dense,
        }
    }
}

impl fmt::Debug for QueryKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKind::Dense(e) => write!(f, "Dense(dim={})", e.dim()),
            other => write!(f, "{:?}", other.mode()),
        }
    }
}

/// One search request. `index: None` defers to the caller's default index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub index: Option<String>,
    pub field: String,
    pub text: String,
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default = "default_size")]
    pub size: usize,
}

fn default_size() -> usize {
    DEFAULT_SEARCH_SIZE
}

impl SearchQuery {
    pub fn new(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self { index: None, field: field.into(), text: text.into(), mode: SearchMode::default(), size: DEFAULT_SEARCH_SIZE }
    }

    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// The target index, or `InvalidConfig` when none was set.
    pub fn target(&self) -> Result<&str> {
        self.index
            .as_deref()
            .ok_or_else(|| Error::InvalidConfig("no index given and no default index configured".to_string()))
    }
}
