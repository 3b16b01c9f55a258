use assert_matches::assert_matches;

use dataset_harvest::config::{ConfigLoader, DEFAULT_MAX_SIZE_MB};
use dataset_harvest::error::HarvestError;

fn write_config(content: &str) -> (tempfile::TempDir, String) {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("harvest.json");
    std::fs::write(&path, content).unwrap();
    let path = path.to_str().unwrap().to_string();
    (temp, path)
}

#[test]
fn resolves_detailed_ranges_from_file() {
    let (_temp, path) = write_config(
        r#"{
            "schema_version": 1,
            "output": "harvested",
            "kaggle": {
                "search_terms": ["health", "finance"],
                "allowed_licenses": ["CC0-1.0", "CC-BY-SA-4.0"],
                "max_size_mb": 25,
                "pages": { "start": 1, "end": 4 },
                "unzip": true
            },
            "openml": { "ids": { "start": 50, "end": 60 } }
        }"#,
    );

    let resolved = ConfigLoader::resolve(Some(&path)).unwrap();
    assert_eq!(resolved.output, "harvested");

    let kaggle = resolved.kaggle.unwrap();
    assert_eq!(kaggle.search_terms, vec!["health", "finance"]);
    assert_eq!(kaggle.allowed_licenses.len(), 2);
    assert_eq!(kaggle.max_size_mb, 25);
    assert_eq!(kaggle.pages.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(kaggle.unzip);

    let openml = resolved.openml.unwrap();
    assert_eq!(openml.ids.iter().next(), Some(50));
    assert_eq!(openml.ids.len(), 10);
}

#[test]
fn kaggle_only_config_has_no_openml_request() {
    let (_temp, path) = write_config(r#"{ "kaggle": { "search_terms": ["iris"], "pages": "2..=3" } }"#);

    let resolved = ConfigLoader::resolve(Some(&path)).unwrap();
    assert!(resolved.openml.is_none());
    let kaggle = resolved.kaggle.unwrap();
    assert_eq!(kaggle.max_size_mb, DEFAULT_MAX_SIZE_MB);
    assert_eq!(kaggle.pages.iter().collect::<Vec<_>>(), vec![2, 3]);
}

#[test]
fn invalid_ranges_are_rejected() {
    let (_temp, path) = write_config(r#"{ "kaggle": { "search_terms": ["x"], "pages": "0..3" } }"#);
    assert_matches!(
        ConfigLoader::resolve(Some(&path)),
        Err(HarvestError::InvalidRange(_))
    );

    let (_temp, path) = write_config(r#"{ "openml": { "ids": { "start": 9, "end": 3 } } }"#);
    assert_matches!(
        ConfigLoader::resolve(Some(&path)),
        Err(HarvestError::InvalidRange(_))
    );
}

#[test]
fn unreadable_and_malformed_configs() {
    let temp = tempfile::tempdir().unwrap();
    let missing = temp.path().join("absent.json");
    assert_matches!(
        ConfigLoader::resolve(missing.to_str()),
        Err(HarvestError::ConfigRead(_))
    );

    let (_temp, path) = write_config("{ not json");
    assert_matches!(
        ConfigLoader::resolve(Some(&path)),
        Err(HarvestError::ConfigParse(_))
    );
}
