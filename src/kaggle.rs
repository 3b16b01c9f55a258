use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::BaseDirs;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::KaggleRef;
use crate::error::HarvestError;
use crate::fs_util;
use crate::http;

pub const KAGGLE_API_URL: &str = "https://www.kaggle.com/api/v1";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Clone, Deserialize)]
pub struct KaggleCredentials {
    pub username: String,
    pub key: String,
}

impl fmt::Debug for KaggleCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KaggleCredentials")
            .field("username", &self.username)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl KaggleCredentials {
    /// Looks up `KAGGLE_USERNAME`/`KAGGLE_KEY`, then `$KAGGLE_CONFIG_DIR/kaggle.json`,
    /// then `~/.kaggle/kaggle.json`.
    pub fn discover() -> Result<Self, HarvestError> {
        if let (Ok(username), Ok(key)) =
            (std::env::var("KAGGLE_USERNAME"), std::env::var("KAGGLE_KEY"))
        {
            return Ok(Self { username, key });
        }
        Self::from_file(&Self::default_path()?)
    }

    pub fn from_file(path: &Path) -> Result<Self, HarvestError> {
        let content = fs::read_to_string(path).map_err(|err| {
            HarvestError::KaggleCredentials(format!("read {}: {err}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|err| {
            HarvestError::KaggleCredentials(format!("parse {}: {err}", path.display()))
        })
    }

    fn default_path() -> Result<PathBuf, HarvestError> {
        if let Ok(dir) = std::env::var("KAGGLE_CONFIG_DIR") {
            return Ok(PathBuf::from(dir).join("kaggle.json"));
        }
        BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".kaggle").join("kaggle.json"))
            .ok_or_else(|| {
                HarvestError::KaggleCredentials("unable to resolve home directory".to_string())
            })
    }
}

/// An authenticated Kaggle session. Built once by the caller and handed to
/// the HTTP client; every request carries its basic-auth header.
#[derive(Debug, Clone)]
pub struct KaggleSession {
    credentials: KaggleCredentials,
}

impl KaggleSession {
    pub fn authenticate(credentials: KaggleCredentials) -> Result<Self, HarvestError> {
        if credentials.username.trim().is_empty() {
            return Err(HarvestError::KaggleCredentials(
                "username is empty".to_string(),
            ));
        }
        if credentials.key.trim().is_empty() {
            return Err(HarvestError::KaggleCredentials("key is empty".to_string()));
        }
        Ok(Self { credentials })
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(
            self.credentials.username.trim(),
            Some(self.credentials.key.trim()),
        )
    }
}

/// A validated entry from a Kaggle dataset listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KaggleCandidate {
    pub reference: KaggleRef,
    pub title: String,
    pub subtitle: Option<String>,
    pub url: String,
    pub license_name: Option<String>,
    pub total_bytes: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawListing {
    #[serde(rename = "ref")]
    reference: Option<String>,
    title: Option<String>,
    subtitle: Option<String>,
    url: Option<String>,
    license_name: Option<String>,
    total_bytes: Option<u64>,
}

impl KaggleCandidate {
    pub fn size_mb(&self) -> f64 {
        self.total_bytes as f64 / BYTES_PER_MB
    }

    pub fn from_value(value: Value) -> Result<Self, HarvestError> {
        let raw: RawListing = serde_json::from_value(value)
            .map_err(|err| HarvestError::KaggleCandidate(err.to_string()))?;
        let reference = raw
            .reference
            .ok_or_else(|| HarvestError::KaggleCandidate("missing ref".to_string()))?
            .parse()?;
        let title = raw
            .title
            .filter(|title| !title.trim().is_empty())
            .ok_or_else(|| HarvestError::KaggleCandidate(format!("{reference}: missing title")))?;
        let url = raw
            .url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| HarvestError::KaggleCandidate(format!("{reference}: missing url")))?;
        let total_bytes = raw
            .total_bytes
            .ok_or_else(|| HarvestError::KaggleCandidate(format!("{reference}: missing size")))?;
        Ok(Self {
            reference,
            title,
            subtitle: raw.subtitle.filter(|s| !s.is_empty()),
            url,
            license_name: raw.license_name,
            total_bytes,
        })
    }
}

/// Splits a listing response into candidates, dropping malformed entries.
pub fn parse_listing(value: Value) -> Result<Vec<KaggleCandidate>, HarvestError> {
    let Value::Array(items) = value else {
        return Err(HarvestError::KaggleCandidate(
            "listing response is not an array".to_string(),
        ));
    };
    let mut candidates = Vec::with_capacity(items.len());
    for item in items {
        match KaggleCandidate::from_value(item) {
            Ok(candidate) => candidates.push(candidate),
            Err(err) => tracing::warn!(error = %err, "dropping listing entry"),
        }
    }
    Ok(candidates)
}

/// License and size gate. An empty allow-list accepts everything.
#[derive(Debug, Clone)]
pub struct LicenseFilter {
    allowed: Vec<String>,
    max_size_mb: u64,
}

impl LicenseFilter {
    pub fn new(allowed: Vec<String>, max_size_mb: u64) -> Self {
        Self {
            allowed,
            max_size_mb,
        }
    }

    pub fn accepts(&self, candidate: &KaggleCandidate) -> bool {
        if self.allowed.is_empty() {
            return true;
        }
        let licensed = candidate
            .license_name
            .as_ref()
            .is_some_and(|license| self.allowed.iter().any(|allowed| allowed == license));
        licensed && candidate.size_mb() <= self.max_size_mb as f64
    }
}

pub trait KaggleClient: Send + Sync {
    fn list_datasets(
        &self,
        search: &str,
        page: u32,
        max_size_bytes: Option<u64>,
    ) -> Result<Vec<KaggleCandidate>, HarvestError>;

    /// Downloads the dataset archive into `destination_dir` as
    /// `<owner>_<slug>.zip` and returns its path, or the `<owner>_<slug>/`
    /// folder it was unpacked into when `unzip` is set.
    fn download_dataset(
        &self,
        reference: &KaggleRef,
        destination_dir: &Path,
        unzip: bool,
    ) -> Result<PathBuf, HarvestError>;
}

#[derive(Clone)]
pub struct KaggleHttpClient {
    client: Client,
    download_client: Client,
    base_url: String,
    session: KaggleSession,
}

impl KaggleHttpClient {
    pub fn new(session: KaggleSession) -> Result<Self, HarvestError> {
        Self::with_base_url(session, KAGGLE_API_URL)
    }

    pub fn with_base_url(session: KaggleSession, base_url: &str) -> Result<Self, HarvestError> {
        let client = http::build_client(Duration::from_secs(30), HarvestError::KaggleHttp)?;
        let download_client =
            http::build_client(Duration::from_secs(300), HarvestError::KaggleHttp)?;
        Ok(Self {
            client,
            download_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    fn handle_status(response: Response) -> Result<Response, HarvestError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "Kaggle request failed".to_string());
        Err(HarvestError::KaggleStatus { status, message })
    }
}

impl KaggleClient for KaggleHttpClient {
    fn list_datasets(
        &self,
        search: &str,
        page: u32,
        max_size_bytes: Option<u64>,
    ) -> Result<Vec<KaggleCandidate>, HarvestError> {
        let url = format!("{}/datasets/list", self.base_url);
        let page = page.to_string();
        let max_size = max_size_bytes.map(|bytes| bytes.to_string());
        tracing::debug!(%url, search = %search, page = %page, "listing Kaggle datasets");
        let response = http::send_with_retries(
            || {
                let mut request = self
                    .client
                    .get(&url)
                    .query(&[("search", search), ("page", page.as_str())]);
                if let Some(max_size) = &max_size {
                    request = request.query(&[("maxSize", max_size.as_str())]);
                }
                self.session.authorize(request)
            },
            HarvestError::KaggleHttp,
        )?;
        let response = Self::handle_status(response)?;
        let value: Value = response
            .json()
            .map_err(|err| HarvestError::KaggleHttp(err.to_string()))?;
        parse_listing(value)
    }

    fn download_dataset(
        &self,
        reference: &KaggleRef,
        destination_dir: &Path,
        unzip: bool,
    ) -> Result<PathBuf, HarvestError> {
        let url = format!(
            "{}/datasets/download/{}/{}",
            self.base_url,
            reference.owner(),
            reference.slug()
        );
        tracing::debug!(%url, "downloading Kaggle dataset");
        fs::create_dir_all(destination_dir)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;

        let response = http::send_with_retries(
            || self.session.authorize(self.download_client.get(&url)),
            HarvestError::KaggleHttp,
        )?;
        let mut response = Self::handle_status(response)?;

        // Nothing appears under the final name until the transfer completes.
        let mut temp = tempfile::Builder::new()
            .prefix(".kaggle-download")
            .tempfile_in(destination_dir)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, temp.as_file_mut())
            .map_err(|err| HarvestError::KaggleHttp(err.to_string()))?;

        let stem = reference.file_stem();
        let archive_path = destination_dir.join(format!("{stem}.zip"));
        temp.persist(&archive_path)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;

        if !unzip {
            return Ok(archive_path);
        }
        let dataset_dir = destination_dir.join(&stem);
        let files = fs_util::unpack_dataset_archive(&archive_path, &dataset_dir)?;
        tracing::debug!(%reference, files, "unpacked Kaggle archive");
        fs::remove_file(&archive_path).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        Ok(dataset_dir)
    }
}
