use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use dataset_harvest::catalog::{
    CATALOG_FILE, Catalog, CatalogEntry, CatalogLayout, DedupIndex, DuplicateKey,
};
use dataset_harvest::domain::SourceTag;
use dataset_harvest::error::HarvestError;

fn layout(temp: &tempfile::TempDir) -> CatalogLayout {
    CatalogLayout::new(Utf8PathBuf::from_path_buf(temp.path().join("out")).unwrap())
}

fn entry(title: &str, link: &str) -> CatalogEntry {
    CatalogEntry {
        title: title.to_string(),
        file_name: title.to_string(),
        description: format!("{title}, with \"quotes\"\nand a newline"),
        link: link.to_string(),
    }
}

#[test]
fn init_creates_layout_and_empty_catalog() {
    let temp = tempfile::tempdir().unwrap();
    let layout = layout(&temp);
    Catalog::init(&layout).unwrap();

    assert!(layout.kaggle_dir().as_std_path().is_dir());
    assert!(layout.openml_dir().as_std_path().is_dir());
    assert_eq!(layout.catalog_path(), layout.root().join(CATALOG_FILE));

    let catalog = Catalog::load(&layout).unwrap();
    assert!(catalog.is_empty());
}

#[test]
fn saved_rows_survive_reload_in_order() {
    let temp = tempfile::tempdir().unwrap();
    let layout = layout(&temp);
    Catalog::init(&layout).unwrap();

    let mut catalog = Catalog::load(&layout).unwrap();
    catalog.push(entry("Iris", "https://www.openml.org/d/61"));
    catalog.push(entry("Wine", "https://www.openml.org/d/187"));
    catalog.save(SourceTag::Openml).unwrap();

    // A second init must not wipe existing rows.
    Catalog::init(&layout).unwrap();
    let reloaded = Catalog::load(&layout).unwrap();
    assert_eq!(reloaded.sheet(), "openml");
    assert_eq!(reloaded.entries(), catalog.entries());

    let raw = std::fs::read_to_string(layout.catalog_path().as_std_path()).unwrap();
    assert!(raw.contains("\"file-name\""));
}

#[test]
fn unexpected_columns_are_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let layout = layout(&temp);
    layout.ensure_dirs().unwrap();
    std::fs::write(
        layout.catalog_path().as_std_path(),
        r#"{"sheet":"kaggle","columns":["title","link"],"rows":[]}"#,
    )
    .unwrap();

    assert_matches!(
        Catalog::load(&layout),
        Err(HarvestError::CatalogSchema { .. })
    );
}

#[test]
fn dedup_index_checks_title_then_link() {
    let mut index = DedupIndex::from_entries(&[entry("Iris", "https://a")]);
    assert_eq!(index.duplicate_of("Iris", "https://b"), Some(DuplicateKey::Title));
    assert_eq!(index.duplicate_of("Flowers", "https://a"), Some(DuplicateKey::Link));
    assert_eq!(index.duplicate_of("Flowers", "https://b"), None);

    index.insert(&entry("Flowers", "https://b"));
    assert_eq!(index.duplicate_of("Flowers", "https://c"), Some(DuplicateKey::Title));
}
