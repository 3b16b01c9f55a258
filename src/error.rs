use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HarvestError {
    #[error("invalid Kaggle dataset reference: {0}")]
    InvalidKaggleRef(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("missing config file harvest.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("Kaggle credentials unavailable: {0}")]
    #[diagnostic(help(
        "set KAGGLE_USERNAME and KAGGLE_KEY or place kaggle.json in ~/.kaggle"
    ))]
    KaggleCredentials(String),

    #[error("Kaggle request failed: {0}")]
    KaggleHttp(String),

    #[error("Kaggle returned status {status}: {message}")]
    KaggleStatus { status: u16, message: String },

    #[error("invalid Kaggle listing entry: {0}")]
    KaggleCandidate(String),

    #[error("OpenML request failed: {0}")]
    OpenmlHttp(String),

    #[error("OpenML returned status {status}: {message}")]
    OpenmlStatus { status: u16, message: String },

    #[error("OpenML dataset {0} is private or not accessible")]
    OpenmlPrivate(u32),

    #[error("invalid OpenML dataset description: {0}")]
    OpenmlMetadata(String),

    #[error("failed to parse ARFF content: {0}")]
    Arff(String),

    #[error("table shape mismatch: {0}")]
    TableShape(String),

    #[error("failed to read catalog at {path}: {message}")]
    CatalogRead { path: String, message: String },

    #[error("catalog at {path} is corrupt: {message}")]
    CatalogParse { path: String, message: String },

    #[error("catalog columns {found:?} do not match the expected {expected:?}")]
    CatalogSchema {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
