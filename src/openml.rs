use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::Serialize;
use serde_json::Value;

use crate::arff;
use crate::error::HarvestError;
use crate::http;
use crate::table::Table;

pub const OPENML_API_URL: &str = "https://www.openml.org/api/v1";
pub const LABEL_COLUMN: &str = "class";
const PRIVATE_DATASET_CODE: &str = "112";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenmlDataset {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub default_target_attribute: Option<String>,
    pub original_data_url: Option<String>,
    pub file_url: String,
}

impl OpenmlDataset {
    /// Catalog link: the original data URL, or the OpenML page when the
    /// uploader did not provide one.
    pub fn link(&self) -> String {
        self.original_data_url
            .clone()
            .unwrap_or_else(|| format!("https://www.openml.org/d/{}", self.id))
    }
}

/// Features with the target attribute split off, as returned by the
/// content endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetContent {
    pub features: Table,
    pub label: Option<Vec<String>>,
    pub attribute_names: Vec<String>,
}

impl DatasetContent {
    /// Features plus a trailing `class` column when a label is present.
    pub fn into_export_table(self) -> Result<Table, HarvestError> {
        let mut table = self.features;
        if let Some(label) = self.label {
            table.push_column(LABEL_COLUMN, label)?;
        }
        Ok(table)
    }
}

/// Separates the first declared target attribute from the feature columns.
/// An unknown target leaves every column in the features.
pub fn split_target(mut table: Table, target: Option<&str>) -> DatasetContent {
    let target = target
        .and_then(|value| value.split(',').map(str::trim).find(|name| !name.is_empty()));
    let label = target.and_then(|name| {
        let label = table.take_column(name);
        if label.is_none() {
            tracing::warn!(target = name, "target attribute not present in content");
        }
        label
    });
    let attribute_names = table.columns.clone();
    DatasetContent {
        features: table,
        label,
        attribute_names,
    }
}

pub fn parse_description(id: u32, value: &Value) -> Result<OpenmlDataset, HarvestError> {
    let description = value
        .get("data_set_description")
        .ok_or_else(|| HarvestError::OpenmlMetadata(format!("{id}: missing data_set_description")))?;
    let text = |key: &str| {
        description
            .get(key)
            .and_then(|value| value.as_str())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let name = text("name")
        .ok_or_else(|| HarvestError::OpenmlMetadata(format!("{id}: missing name")))?;
    let file_url =
        text("url").ok_or_else(|| HarvestError::OpenmlMetadata(format!("{id}: missing url")))?;

    Ok(OpenmlDataset {
        id,
        name,
        description: text("description").unwrap_or_default(),
        default_target_attribute: text("default_target_attribute"),
        original_data_url: text("original_data_url"),
        file_url,
    })
}

/// Maps a failed OpenML response to an error, recognising the
/// "no access granted" code used for private datasets.
pub fn classify_error(id: u32, status: u16, body: &str) -> HarvestError {
    let code = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        value
            .get("error")
            .and_then(|error| error.get("code"))
            .and_then(|code| match code {
                Value::String(code) => Some(code.clone()),
                Value::Number(code) => Some(code.to_string()),
                _ => None,
            })
    });
    if code.as_deref() == Some(PRIVATE_DATASET_CODE) || status == 403 {
        return HarvestError::OpenmlPrivate(id);
    }
    HarvestError::OpenmlStatus {
        status,
        message: body.to_string(),
    }
}

pub trait OpenmlClient: Send + Sync {
    fn fetch_metadata(&self, id: u32) -> Result<OpenmlDataset, HarvestError>;
    fn fetch_content(
        &self,
        dataset: &OpenmlDataset,
        target: Option<&str>,
    ) -> Result<DatasetContent, HarvestError>;
}

#[derive(Clone)]
pub struct OpenmlHttpClient {
    client: Client,
    download_client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenmlHttpClient {
    pub fn new() -> Result<Self, HarvestError> {
        Self::with_base_url(OPENML_API_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, HarvestError> {
        let client = http::build_client(Duration::from_secs(30), HarvestError::OpenmlHttp)?;
        let download_client =
            http::build_client(Duration::from_secs(300), HarvestError::OpenmlHttp)?;
        let api_key = std::env::var("OPENML_APIKEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        Ok(Self {
            client,
            download_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn handle_status(id: u32, response: Response) -> Result<Response, HarvestError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response
            .text()
            .unwrap_or_else(|_| "OpenML request failed".to_string());
        Err(classify_error(id, status, &body))
    }
}

impl OpenmlClient for OpenmlHttpClient {
    fn fetch_metadata(&self, id: u32) -> Result<OpenmlDataset, HarvestError> {
        let url = format!("{}/json/data/{id}", self.base_url);
        tracing::debug!(%url, "fetching OpenML description");
        let response = http::send_with_retries(
            || {
                let request = self.client.get(&url);
                match &self.api_key {
                    Some(key) => request.query(&[("api_key", key.as_str())]),
                    None => request,
                }
            },
            HarvestError::OpenmlHttp,
        )?;
        let response = Self::handle_status(id, response)?;
        let value: Value = response
            .json()
            .map_err(|err| HarvestError::OpenmlHttp(err.to_string()))?;
        parse_description(id, &value)
    }

    fn fetch_content(
        &self,
        dataset: &OpenmlDataset,
        target: Option<&str>,
    ) -> Result<DatasetContent, HarvestError> {
        tracing::debug!(url = %dataset.file_url, "downloading OpenML content");
        let response = http::send_with_retries(
            || self.download_client.get(&dataset.file_url),
            HarvestError::OpenmlHttp,
        )?;
        let response = Self::handle_status(dataset.id, response)?;
        let text = response
            .text()
            .map_err(|err| HarvestError::OpenmlHttp(err.to_string()))?;
        let table = arff::parse(&text)?;
        Ok(split_target(table, target))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn description_fields() {
        let value = json!({
            "data_set_description": {
                "id": "61",
                "name": "iris",
                "description": "Famous flowers",
                "url": "https://api.openml.org/data/v1/download/61/iris.arff",
                "default_target_attribute": "class",
                "original_data_url": ""
            }
        });
        let dataset = parse_description(61, &value).unwrap();
        assert_eq!(dataset.name, "iris");
        assert_eq!(dataset.default_target_attribute.as_deref(), Some("class"));
        assert_eq!(dataset.original_data_url, None);
        assert_eq!(dataset.link(), "https://www.openml.org/d/61");
    }

    #[test]
    fn description_requires_name() {
        let value = json!({ "data_set_description": { "url": "https://x" } });
        assert_matches!(
            parse_description(1, &value),
            Err(HarvestError::OpenmlMetadata(_))
        );
    }

    #[test]
    fn private_code_detected() {
        let body = r#"{"error":{"code":"112","message":"No access granted"}}"#;
        assert_matches!(classify_error(7, 412, body), HarvestError::OpenmlPrivate(7));

        let unknown = r#"{"error":{"code":"111","message":"Unknown dataset"}}"#;
        assert_matches!(
            classify_error(7, 412, unknown),
            HarvestError::OpenmlStatus { status: 412, .. }
        );
    }

    #[test]
    fn target_becomes_class_column() {
        let table = Table {
            columns: vec!["x".to_string(), "species".to_string(), "y".to_string()],
            rows: vec![vec!["1".to_string(), "a".to_string(), "2".to_string()]],
        };
        let content = split_target(table, Some("species"));
        assert_eq!(content.attribute_names, vec!["x", "y"]);
        let export = content.into_export_table().unwrap();
        assert_eq!(export.columns, vec!["x", "y", "class"]);
        assert_eq!(export.rows[0], vec!["1", "2", "a"]);
    }

    #[test]
    fn unknown_or_missing_target_keeps_features() {
        let table = Table {
            columns: vec!["x".to_string()],
            rows: vec![vec!["1".to_string()]],
        };
        let content = split_target(table.clone(), Some("nope"));
        assert!(content.label.is_none());
        assert_eq!(content.into_export_table().unwrap(), table);

        let content = split_target(table.clone(), None);
        assert!(content.label.is_none());
    }
}
