//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`APP_ENGINE__URL` sets `engine.url`). [`Settings`] is the typed view with
//! defaults for every key.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::types::ColumnPolicy;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// A single explicit TOML file plus `APP_*` overrides.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            anyhow::bail!("config file {} does not exist", path.display());
        }
        let figment = Figment::new().merge(Toml::file(path)).merge(Env::prefixed("APP_").split("__"));
        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Typed settings, defaults filled in for absent keys.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(self.figment.clone())
            .extract()
            .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub index: IndexSettings,
    pub ingest: IngestSettings,
    pub search: SearchSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub url: String,
    /// Unset leaves the transport default in place.
    pub request_timeout_secs: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self { url: "http://localhost:9200".to_string(), request_timeout_secs: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub default: Option<String>,
    pub spec_dir: String,
    pub shards: u32,
    pub replicas: u32,
    pub dense_dims: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            default: None,
            spec_dir: "specs".to_string(),
            shards: crate::spec::DEFAULT_SHARDS,
            replicas: crate::spec::DEFAULT_REPLICAS,
            dense_dims: crate::spec::DEFAULT_DENSE_DIMS,
        }
    }
}

impl IndexSettings {
    pub fn spec_dir_path(&self) -> PathBuf {
        expand_path(&self.spec_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub chunk_size: usize,
    pub id_field: Option<String>,
    pub embed_field: Option<String>,
    /// Chunks in flight at once; 1 is strictly sequential.
    pub concurrency: usize,
    /// Persist the resume checkpoint every N committed chunks.
    pub checkpoint_every: u64,
    pub delimiter: char,
    pub index_column: bool,
    pub show_progress: bool,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            id_field: None,
            embed_field: None,
            concurrency: 1,
            checkpoint_every: 10,
            delimiter: ',',
            index_column: false,
            show_progress: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub size: usize,
    pub columns: ColumnPolicy,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { size: 10, columns: ColumnPolicy::Union }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub dir: String,
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { dir: "logs".to_string(), level: "debug".to_string() }
    }
}

/// `~` and `$VAR`/`${VAR}` expanded; unknown variables are left as written.
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
