use std::collections::HashSet;
use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tempfile::Builder;

use crate::domain::SourceTag;
use crate::error::HarvestError;

pub const CATALOG_FILE: &str = "datasets_information.json";
pub const CATALOG_COLUMNS: [&str; 4] = ["title", "file-name", "description", "link"];
const INITIAL_SHEET: &str = "catalog";

/// One accepted dataset. `title` and `link` are both dedup keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    #[serde(rename = "file-name")]
    pub file_name: String,
    #[serde(default)]
    pub description: String,
    pub link: String,
}

/// Directory layout under a single output folder.
#[derive(Debug, Clone)]
pub struct CatalogLayout {
    root: Utf8PathBuf,
}

impl CatalogLayout {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn catalog_path(&self) -> Utf8PathBuf {
        self.root.join(CATALOG_FILE)
    }

    pub fn datasets_dir(&self) -> Utf8PathBuf {
        self.root.join("datasets")
    }

    pub fn kaggle_dir(&self) -> Utf8PathBuf {
        self.datasets_dir().join("kaggledata")
    }

    pub fn openml_dir(&self) -> Utf8PathBuf {
        self.datasets_dir().join("openml")
    }

    pub fn ensure_dirs(&self) -> Result<(), HarvestError> {
        for dir in [self.datasets_dir(), self.kaggle_dir(), self.openml_dir()] {
            fs::create_dir_all(dir.as_std_path())
                .map_err(|err| HarvestError::Filesystem(format!("create {dir}: {err}")))?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Workbook {
    sheet: String,
    columns: Vec<String>,
    rows: Vec<CatalogEntry>,
}

/// In-memory copy of the catalog file. Rows are only appended; the file is
/// rewritten as a whole on every save.
#[derive(Debug, Clone)]
pub struct Catalog {
    path: Utf8PathBuf,
    sheet: String,
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Creates the download folders and an empty catalog file when missing.
    /// An existing catalog is left untouched.
    pub fn init(layout: &CatalogLayout) -> Result<(), HarvestError> {
        layout.ensure_dirs()?;
        let path = layout.catalog_path();
        if path.as_std_path().exists() {
            return Ok(());
        }
        tracing::info!(%path, "creating empty catalog");
        let catalog = Catalog {
            path,
            sheet: INITIAL_SHEET.to_string(),
            entries: Vec::new(),
        };
        catalog.write()
    }

    pub fn load(layout: &CatalogLayout) -> Result<Self, HarvestError> {
        let path = layout.catalog_path();
        let content =
            fs::read_to_string(path.as_std_path()).map_err(|err| HarvestError::CatalogRead {
                path: path.to_string(),
                message: err.to_string(),
            })?;
        let workbook: Workbook =
            serde_json::from_str(&content).map_err(|err| HarvestError::CatalogParse {
                path: path.to_string(),
                message: err.to_string(),
            })?;
        if workbook.columns.iter().map(String::as_str).ne(CATALOG_COLUMNS) {
            return Err(HarvestError::CatalogSchema {
                expected: CATALOG_COLUMNS.iter().map(|c| c.to_string()).collect(),
                found: workbook.columns,
            });
        }
        Ok(Self {
            path,
            sheet: workbook.sheet,
            entries: workbook.rows,
        })
    }

    /// Overwrites the catalog file with every row, tagging the sheet with
    /// the source that wrote last.
    pub fn save(&mut self, label: SourceTag) -> Result<(), HarvestError> {
        self.sheet = label.as_str().to_string();
        self.write()
    }

    pub fn push(&mut self, entry: CatalogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<CatalogEntry> {
        self.entries
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn write(&self) -> Result<(), HarvestError> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| HarvestError::Filesystem("invalid catalog path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;

        let workbook = Workbook {
            sheet: self.sheet.clone(),
            columns: CATALOG_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: self.entries.clone(),
        };
        let content = serde_json::to_vec_pretty(&workbook)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;

        let mut temp = Builder::new()
            .prefix(".datasets_information")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        temp.write_all(&content)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        temp.persist(self.path.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKey {
    Title,
    Link,
}

/// Title and link sets used to decide whether a candidate was seen before.
#[derive(Debug, Default, Clone)]
pub struct DedupIndex {
    titles: HashSet<String>,
    links: HashSet<String>,
}

impl DedupIndex {
    pub fn from_entries(entries: &[CatalogEntry]) -> Self {
        let mut index = Self::default();
        for entry in entries {
            index.insert(entry);
        }
        index
    }

    pub fn duplicate_of(&self, title: &str, link: &str) -> Option<DuplicateKey> {
        if self.titles.contains(title) {
            Some(DuplicateKey::Title)
        } else if self.links.contains(link) {
            Some(DuplicateKey::Link)
        } else {
            None
        }
    }

    pub fn insert(&mut self, entry: &CatalogEntry) {
        self.titles.insert(entry.title.clone());
        self.links.insert(entry.link.clone());
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn layout() -> (tempfile::TempDir, CatalogLayout) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("out")).unwrap();
        (temp, CatalogLayout::new(root))
    }

    fn entry(title: &str, link: &str) -> CatalogEntry {
        CatalogEntry {
            title: title.to_string(),
            file_name: title.to_lowercase(),
            description: String::new(),
            link: link.to_string(),
        }
    }

    #[test]
    fn init_creates_layout_and_empty_catalog() {
        let (_temp, layout) = layout();
        Catalog::init(&layout).unwrap();

        assert!(layout.kaggle_dir().as_std_path().is_dir());
        assert!(layout.openml_dir().as_std_path().is_dir());
        let catalog = Catalog::load(&layout).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.sheet(), "catalog");
    }

    #[test]
    fn init_keeps_existing_rows() {
        let (_temp, layout) = layout();
        Catalog::init(&layout).unwrap();
        let mut catalog = Catalog::load(&layout).unwrap();
        catalog.push(entry("Iris", "https://example.org/iris"));
        catalog.save(SourceTag::Openml).unwrap();

        Catalog::init(&layout).unwrap();
        let reloaded = Catalog::load(&layout).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.sheet(), "openml");
    }

    #[test]
    fn persisted_rows_use_hyphenated_column() {
        let (_temp, layout) = layout();
        Catalog::init(&layout).unwrap();
        let mut catalog = Catalog::load(&layout).unwrap();
        catalog.push(entry("Iris", "https://example.org/iris"));
        catalog.save(SourceTag::Kaggle).unwrap();

        let raw = fs::read_to_string(layout.catalog_path().as_std_path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["columns"][1], "file-name");
        assert_eq!(value["rows"][0]["file-name"], "iris");
        assert_eq!(value["sheet"], "kaggle");
    }

    #[test]
    fn load_rejects_corrupt_and_foreign_files() {
        let (_temp, layout) = layout();
        layout.ensure_dirs().unwrap();
        assert_matches!(
            Catalog::load(&layout),
            Err(HarvestError::CatalogRead { .. })
        );

        fs::write(layout.catalog_path().as_std_path(), b"{not json").unwrap();
        assert_matches!(
            Catalog::load(&layout),
            Err(HarvestError::CatalogParse { .. })
        );

        fs::write(
            layout.catalog_path().as_std_path(),
            br#"{"sheet":"x","columns":["title","link"],"rows":[]}"#,
        )
        .unwrap();
        assert_matches!(
            Catalog::load(&layout),
            Err(HarvestError::CatalogSchema { .. })
        );
    }

    #[test]
    fn dedup_index_checks_both_keys() {
        let mut index = DedupIndex::from_entries(&[entry("Iris", "https://a")]);
        assert_eq!(index.duplicate_of("Iris", "https://b"), Some(DuplicateKey::Title));
        assert_eq!(index.duplicate_of("Wine", "https://a"), Some(DuplicateKey::Link));
        assert_eq!(index.duplicate_of("Wine", "https://b"), None);

        index.insert(&entry("Wine", "https://b"));
        assert_eq!(index.duplicate_of("Wine", "https://c"), Some(DuplicateKey::Title));
    }
}
