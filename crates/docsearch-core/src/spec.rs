//! Index schema description and its on-disk form.
//!
//! A spec file looks like
//! `{"settings": {"number_of_shards", "number_of_replicas"},
//!   "mappings": {"dynamic", "_source": {"enabled"}, "properties": {..}}}`
//! and is stored as `<folder>/spec_<index>.json`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DEFAULT_SHARDS: u32 = 3;
pub const DEFAULT_REPLICAS: u32 = 1;
pub const DEFAULT_DENSE_DIMS: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Keyword,
    DenseVector { dims: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub shards: u32,
    pub replicas: u32,
    pub fields: BTreeMap<String, FieldType>,
}

impl Default for IndexSpec {
    /// 3 shards, 1 replica, no field mapping.
    fn default() -> Self {
        Self { shards: DEFAULT_SHARDS, replicas: DEFAULT_REPLICAS, fields: BTreeMap::new() }
    }
}

#[derive(Serialize, Deserialize)]
struct SpecDocument {
    settings: SettingsDocument,
    #[serde(default)]
    mappings: Option<MappingsDocument>,
}

#[derive(Serialize, Deserialize)]
struct SettingsDocument {
    number_of_shards: u32,
    number_of_replicas: u32,
}

#[derive(Serialize, Deserialize)]
struct MappingsDocument {
    dynamic: String,
    #[serde(rename = "_source")]
    source: SourceDocument,
    #[serde(default)]
    properties: BTreeMap<String, FieldType>,
}

#[derive(Serialize, Deserialize)]
struct SourceDocument {
    enabled: String,
}

pub fn spec_file_name(index: &str) -> String {
    format!("spec_{index}.json")
}

impl IndexSpec {
    pub fn builder() -> SpecBuilder {
        SpecBuilder::default()
    }

    /// The settings + mappings document sent on index creation.
    pub fn to_body(&self) -> Value {
        let doc = SpecDocument {
            settings: SettingsDocument { number_of_shards: self.shards, number_of_replicas: self.replicas },
            mappings: Some(MappingsDocument {
                dynamic: "true".to_string(),
                source: SourceDocument { enabled: "true".to_string() },
                properties: self.fields.clone(),
            }),
        };
        serde_json::json!(doc)
    }

    pub fn from_body(body: &Value) -> Result<Self> {
        let doc: SpecDocument = serde_json::from_value(body.clone())?;
        let fields = doc.mappings.map(|m| m.properties).unwrap_or_default();
        for (name, ty) in &fields {
            if matches!(ty, FieldType::DenseVector { dims: 0 }) {
                return Err(Error::InvalidConfig(format!("dense field '{name}' declares zero dims")));
            }
        }
        Ok(Self { shards: doc.settings.number_of_shards, replicas: doc.settings.number_of_replicas, fields })
    }

    /// Write the spec as `<folder>/spec_<index>.json`, creating `folder` if absent.
    pub fn persist(&self, folder: &Path, index: &str) -> Result<PathBuf> {
        fs::create_dir_all(folder)?;
        let path = folder.join(spec_file_name(index));
        fs::write(&path, serde_json::to_string_pretty(&self.to_body())?)?;
        tracing::debug!(path = %path.display(), fields = self.fields.len(), "persisted index spec");
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_body(&read_spec_file(path)?)
    }
}

/// Read a spec file as raw JSON, without interpreting its mapping.
pub fn read_spec_file(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)
        .map_err(|e| Error::InvalidConfig(format!("cannot read spec file {}: {e}", path.display())))?;
    Ok(serde_json::from_str(text.trim())?)
}

/// Collects declared field lists and settings into an [`IndexSpec`].
#[derive(Debug, Clone)]
pub struct SpecBuilder {
    text: Vec<String>,
    keyword: Vec<String>,
    dense: Vec<String>,
    dims: usize,
    shards: u32,
    replicas: u32,
}

impl Default for SpecBuilder {
    fn default() -> Self {
        Self {
            text: Vec::new(),
            keyword: Vec::new(),
            dense: Vec::new(),
            dims: DEFAULT_DENSE_DIMS,
            shards: DEFAULT_SHARDS,
            replicas: DEFAULT_REPLICAS,
        }
    }
}

impl SpecBuilder {
    pub fn text_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.text.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn keyword_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keyword.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Every dense field shares the same dimensionality.
    pub fn dense_fields<I, S>(mut self, fields: I, dims: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dense.extend(fields.into_iter().map(Into::into));
        self.dims = dims;
        self
    }

    pub fn shards(mut self, shards: u32) -> Self {
        self.shards = shards;
        self
    }

    pub fn replicas(mut self, replicas: u32) -> Self {
        self.replicas = replicas;
        self
    }

    pub fn build(self) -> Result<IndexSpec> {
        if self.shards == 0 {
            return Err(Error::InvalidConfig("an index needs at least one shard".to_string()));
        }
        if !self.dense.is_empty() && self.dims == 0 {
            return Err(Error::InvalidConfig("dense fields need dims > 0".to_string()));
        }
        let dims = self.dims;
        let declared = self
            .text
            .into_iter()
            .map(|f| (f, FieldType::Text))
            .chain(self.keyword.into_iter().map(|f| (f, FieldType::Keyword)))
            .chain(self.dense.into_iter().map(|f| (f, FieldType::DenseVector { dims })));
        let mut fields = BTreeMap::new();
        for (name, ty) in declared {
            if name.is_empty() {
                return Err(Error::InvalidConfig("empty field name".to_string()));
            }
            if fields.insert(name.clone(), ty).is_some() {
                return Err(Error::InvalidConfig(format!("field '{name}' declared more than once")));
            }
        }
        Ok(IndexSpec { shards: self.shards, replicas: self.replicas, fields })
    }
}
