//! Schema config: the list of manifests naming the databases to seed.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no schema config given (pass --config or set SCHEMA)")]
    Missing,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("config contains no manifests")]
    Empty,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// One manifest entry. Fields other than `index` and `database` belong to
/// other tools sharing the file and are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub index: String,
    #[serde(default)]
    pub database: Option<String>,
}

impl Manifest {
    pub fn target_database(&self) -> &str {
        self.database.as_deref().unwrap_or(&self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonManifests {
    Many(Vec<Manifest>),
    One(Manifest),
}

#[derive(Deserialize)]
struct TomlManifests {
    #[serde(default)]
    manifest: Vec<Manifest>,
}

pub fn load_manifests(path: Option<&Path>) -> ConfigResult<Vec<Manifest>> {
    let path = path.ok_or(ConfigError::Missing)?;
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifests(&content, ConfigFormat::from_path(path))
}

pub fn parse_manifests(content: &str, format: ConfigFormat) -> ConfigResult<Vec<Manifest>> {
    let manifests = match format {
        ConfigFormat::Json => match serde_json::from_str::<JsonManifests>(content)? {
            JsonManifests::Many(manifests) => manifests,
            JsonManifests::One(manifest) => vec![manifest],
        },
        ConfigFormat::Toml => toml::from_str::<TomlManifests>(content)?.manifest,
    };

    if manifests.is_empty() {
        return Err(ConfigError::Empty);
    }
    Ok(manifests)
}
