use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{IdRange, PageRange};
use crate::error::HarvestError;

pub const DEFAULT_CONFIG_FILE: &str = "harvest.json";
pub const DEFAULT_OUTPUT_DIR: &str = "data_retrieval_output";
pub const DEFAULT_MAX_SIZE_MB: u64 = 10;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub kaggle: Option<KaggleSection>,
    #[serde(default)]
    pub openml: Option<OpenmlSection>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RangeEntry {
    Shorthand(String),
    Detailed(RangeObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RangeObject {
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct KaggleSection {
    pub search_terms: Vec<String>,
    #[serde(default)]
    pub allowed_licenses: Vec<String>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
    #[serde(default)]
    pub pages: Option<RangeEntry>,
    #[serde(default)]
    pub unzip: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OpenmlSection {
    pub ids: RangeEntry,
}

#[derive(Debug, Clone)]
pub struct KaggleRequest {
    pub search_terms: Vec<String>,
    pub allowed_licenses: Vec<String>,
    pub max_size_mb: u64,
    pub pages: PageRange,
    pub unzip: bool,
}

#[derive(Debug, Clone)]
pub struct OpenmlRequest {
    pub ids: IdRange,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub output: Utf8PathBuf,
    pub kaggle: Option<KaggleRequest>,
    pub openml: Option<OpenmlRequest>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, HarvestError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(HarvestError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| HarvestError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| HarvestError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, HarvestError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let output = Utf8PathBuf::from(config.output.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR));

        let kaggle = config
            .kaggle
            .map(|section| -> Result<KaggleRequest, HarvestError> {
                let pages = match section.pages {
                    Some(RangeEntry::Shorthand(value)) => value.parse()?,
                    Some(RangeEntry::Detailed(obj)) => PageRange::new(obj.start, obj.end)?,
                    None => default_pages(),
                };
                Ok(KaggleRequest {
                    search_terms: section.search_terms,
                    allowed_licenses: section.allowed_licenses,
                    max_size_mb: section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB),
                    pages,
                    unzip: section.unzip,
                })
            })
            .transpose()?;

        let openml = config
            .openml
            .map(|section| -> Result<OpenmlRequest, HarvestError> {
                let ids = match section.ids {
                    RangeEntry::Shorthand(value) => value.parse()?,
                    RangeEntry::Detailed(obj) => IdRange::new(obj.start, obj.end)?,
                };
                Ok(OpenmlRequest { ids })
            })
            .transpose()?;

        Ok(ResolvedConfig {
            schema_version,
            output,
            kaggle,
            openml,
        })
    }
}

pub fn default_pages() -> PageRange {
    PageRange::first()
}
