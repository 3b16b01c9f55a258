use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::catalog::{Catalog, CatalogEntry, CatalogLayout, DedupIndex, DuplicateKey};
use crate::config::{KaggleRequest, OpenmlRequest};
use crate::domain::SourceTag;
use crate::error::HarvestError;
use crate::fs_util::sanitize_file_stem;
use crate::kaggle::{KaggleCandidate, KaggleClient, LicenseFilter};
use crate::openml::{OpenmlClient, OpenmlDataset};

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub source: SourceTag,
    pub started_at: String,
    pub finished_at: String,
    pub found: usize,
    pub accepted: Vec<String>,
    pub skipped_duplicates: usize,
    pub skipped_filtered: usize,
    pub skipped_private: usize,
    pub failures: Vec<ItemFailure>,
    pub catalog: Vec<CatalogEntry>,
}

impl RetrievalResult {
    fn new(source: SourceTag) -> Self {
        Self {
            source,
            started_at: iso_timestamp(),
            finished_at: String::new(),
            found: 0,
            accepted: Vec::new(),
            skipped_duplicates: 0,
            skipped_filtered: 0,
            skipped_private: 0,
            failures: Vec::new(),
            catalog: Vec::new(),
        }
    }

    fn finish(mut self, catalog: Catalog) -> Self {
        self.finished_at = iso_timestamp();
        self.catalog = catalog.into_entries();
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub item: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub catalog_path: String,
    pub sheet: Option<String>,
    pub datasets: Vec<CatalogEntry>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub source: Option<SourceTag>,
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Catalog manager bound to one output folder and the two source clients.
#[derive(Clone)]
pub struct App<K: KaggleClient, O: OpenmlClient> {
    layout: CatalogLayout,
    kaggle: K,
    openml: O,
}

impl<K: KaggleClient, O: OpenmlClient> App<K, O> {
    pub fn new(output: Utf8PathBuf, kaggle: K, openml: O) -> Self {
        Self {
            layout: CatalogLayout::new(output),
            kaggle,
            openml,
        }
    }

    pub fn layout(&self) -> &CatalogLayout {
        &self.layout
    }

    pub fn init(&self) -> Result<(), HarvestError> {
        Catalog::init(&self.layout)
    }

    pub fn list(&self, sink: &dyn ProgressSink) -> Result<ListResult, HarvestError> {
        let path = self.layout.catalog_path();
        sink.event(ProgressEvent {
            source: None,
            message: format!("reading catalog {path}"),
            elapsed: None,
        });
        if !path.as_std_path().exists() {
            return Ok(ListResult {
                catalog_path: path.to_string(),
                sheet: None,
                datasets: Vec::new(),
            });
        }
        let catalog = Catalog::load(&self.layout)?;
        Ok(ListResult {
            catalog_path: path.to_string(),
            sheet: Some(catalog.sheet().to_string()),
            datasets: catalog.into_entries(),
        })
    }

    /// Searches Kaggle for every (term, page) pair, then downloads each new
    /// candidate that passes the license and size filter. The catalog is
    /// saved after every successful download.
    pub fn retrieve_kaggle(
        &self,
        request: &KaggleRequest,
        sink: &dyn ProgressSink,
    ) -> Result<RetrievalResult, HarvestError> {
        let source = SourceTag::Kaggle;
        let mut result = RetrievalResult::new(source);
        Catalog::init(&self.layout)?;
        let mut catalog = Catalog::load(&self.layout)?;
        let mut index = DedupIndex::from_entries(catalog.entries());
        let filter = LicenseFilter::new(request.allowed_licenses.clone(), request.max_size_mb);
        let max_size_bytes = request.max_size_mb.checked_mul(BYTES_PER_MB);

        let mut candidates: Vec<KaggleCandidate> = Vec::new();
        for term in &request.search_terms {
            for page in request.pages.iter() {
                match self.kaggle.list_datasets(term, page, max_size_bytes) {
                    Ok(found) => candidates.extend(found),
                    Err(err) => {
                        tracing::warn!(term = %term, page, error = %err, "Kaggle search failed");
                        emit(sink, source, format!("search '{term}' page {page} failed: {err}"));
                        result.failures.push(ItemFailure {
                            item: format!("search:{term}:{page}"),
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }
        result.found = candidates.len();
        emit(
            sink,
            source,
            format!(
                "total datasets found for {:?}: {}",
                request.search_terms,
                candidates.len()
            ),
        );

        let destination = self.layout.kaggle_dir();
        for candidate in candidates {
            if let Some(key) = index.duplicate_of(&candidate.title, &candidate.url) {
                result.skipped_duplicates += 1;
                emit(
                    sink,
                    source,
                    format!(
                        "dataset {} already in records ({}), skipping",
                        candidate.title,
                        duplicate_label(key)
                    ),
                );
                continue;
            }
            if !filter.accepts(&candidate) {
                result.skipped_filtered += 1;
                tracing::debug!(
                    reference = %candidate.reference,
                    license = ?candidate.license_name,
                    size_mb = candidate.size_mb(),
                    "filtered out"
                );
                continue;
            }

            emit(sink, source, format!("dataset URL: {}", candidate.url));
            let start = Instant::now();
            match self.kaggle.download_dataset(
                &candidate.reference,
                destination.as_std_path(),
                request.unzip,
            ) {
                Ok(path) => {
                    sink.event(ProgressEvent {
                        source: Some(source),
                        message: format!("downloaded {} to {}", candidate.reference, path.display()),
                        elapsed: Some(start.elapsed()),
                    });
                }
                Err(err) => {
                    tracing::warn!(reference = %candidate.reference, error = %err, "download failed");
                    emit(
                        sink,
                        source,
                        format!("failed to download dataset {}: {err}", candidate.reference),
                    );
                    result.failures.push(ItemFailure {
                        item: candidate.reference.to_string(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            }

            let entry = CatalogEntry {
                title: candidate.title,
                file_name: candidate.reference.to_string(),
                description: candidate.subtitle.unwrap_or_default(),
                link: candidate.url,
            };
            tracing::info!(title = %entry.title, "accepted Kaggle dataset");
            index.insert(&entry);
            result.accepted.push(entry.title.clone());
            catalog.push(entry);
            catalog.save(source)?;
        }

        Ok(result.finish(catalog))
    }

    /// Walks the id range in ascending order, exporting each new public
    /// dataset as CSV. The catalog is saved after every exported dataset.
    pub fn retrieve_openml(
        &self,
        request: &OpenmlRequest,
        sink: &dyn ProgressSink,
    ) -> Result<RetrievalResult, HarvestError> {
        let source = SourceTag::Openml;
        let mut result = RetrievalResult::new(source);
        Catalog::init(&self.layout)?;
        let mut catalog = Catalog::load(&self.layout)?;
        let mut index = DedupIndex::from_entries(catalog.entries());

        for id in request.ids.iter() {
            let dataset = match self.openml.fetch_metadata(id) {
                Ok(dataset) => dataset,
                Err(HarvestError::OpenmlPrivate(_)) => {
                    result.skipped_private += 1;
                    emit(sink, source, format!("dataset {id} is private, skipping"));
                    continue;
                }
                Err(err) => {
                    tracing::warn!(id, error = %err, "OpenML metadata fetch failed");
                    emit(sink, source, format!("failed to fetch dataset {id}: {err}"));
                    result.failures.push(ItemFailure {
                        item: id.to_string(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            result.found += 1;

            let link = dataset.link();
            if let Some(key) = index.duplicate_of(&dataset.name, &link) {
                result.skipped_duplicates += 1;
                emit(
                    sink,
                    source,
                    format!(
                        "dataset {} already in records ({}), skipping",
                        dataset.name,
                        duplicate_label(key)
                    ),
                );
                continue;
            }

            let start = Instant::now();
            match self.export_openml_content(&dataset) {
                Ok(path) => sink.event(ProgressEvent {
                    source: Some(source),
                    message: format!("dataset {id} saved to {path}"),
                    elapsed: Some(start.elapsed()),
                }),
                Err(err) => {
                    tracing::warn!(id, error = %err, "OpenML content export failed");
                    emit(sink, source, format!("failed to export dataset {id}: {err}"));
                    result.failures.push(ItemFailure {
                        item: id.to_string(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            }

            let entry = CatalogEntry {
                title: dataset.name.clone(),
                file_name: dataset.name,
                description: dataset.description,
                link,
            };
            tracing::info!(id, title = %entry.title, "accepted OpenML dataset");
            index.insert(&entry);
            result.accepted.push(entry.title.clone());
            catalog.push(entry);
            catalog.save(source)?;
        }

        Ok(result.finish(catalog))
    }

    fn export_openml_content(&self, dataset: &OpenmlDataset) -> Result<Utf8PathBuf, HarvestError> {
        let content = self
            .openml
            .fetch_content(dataset, dataset.default_target_attribute.as_deref())?;
        let table = content.into_export_table()?;
        let path = self.openml_export_path(dataset);
        table.write_csv(path.as_std_path())?;
        Ok(path)
    }

    /// `<title>.csv`, or `<title>-<id>.csv` when another title already
    /// sanitized to the same file. Existing exports are never overwritten.
    fn openml_export_path(&self, dataset: &OpenmlDataset) -> Utf8PathBuf {
        let dir = self.layout.openml_dir();
        let stem = sanitize_file_stem(&dataset.name);
        let path = dir.join(format!("{stem}.csv"));
        if !path.as_std_path().exists() {
            return path;
        }
        tracing::debug!(id = dataset.id, %path, "export name taken, adding id suffix");
        dir.join(format!("{stem}-{}.csv", dataset.id))
    }
}

fn emit(sink: &dyn ProgressSink, source: SourceTag, message: String) {
    sink.event(ProgressEvent {
        source: Some(source),
        message,
        elapsed: None,
    });
}

fn duplicate_label(key: DuplicateKey) -> &'static str {
    match key {
        DuplicateKey::Title => "same title",
        DuplicateKey::Link => "same link",
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
