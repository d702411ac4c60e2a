use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use stepwise_core::{Sample, ScalarSeries, SeriesError, Tag};
use thiserror::Error;

mod csv_source;
mod json_source;

pub use csv_source::CsvSource;
pub use json_source::JsonScalarSource;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {} does not exist", .path.display())]
    Unavailable { path: PathBuf },
    #[error("unsupported source format for {}: expected .csv or .json", .path.display())]
    UnsupportedFormat { path: PathBuf },
    #[error("csv source {} has no '{column}' column", .path.display())]
    MissingStepColumn { path: PathBuf, column: &'static str },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid series: {0}")]
    Series(#[from] SeriesError),
}

/// A store of tag-indexed scalar series.
///
/// `fetch` of a tag the store does not hold yields an empty series rather
/// than an error; callers treat it as "no data".
pub trait ScalarSeriesSource {
    fn fetch(&self, tag: &str) -> Result<ScalarSeries, SourceError>;
    fn list_tags(&self) -> Result<BTreeSet<Tag>, SourceError>;
}

impl<S: ScalarSeriesSource + ?Sized> ScalarSeriesSource for &S {
    fn fetch(&self, tag: &str) -> Result<ScalarSeries, SourceError> {
        (**self).fetch(tag)
    }

    fn list_tags(&self) -> Result<BTreeSet<Tag>, SourceError> {
        (**self).list_tags()
    }
}

impl<S: ScalarSeriesSource + ?Sized> ScalarSeriesSource for Box<S> {
    fn fetch(&self, tag: &str) -> Result<ScalarSeries, SourceError> {
        (**self).fetch(tag)
    }

    fn list_tags(&self) -> Result<BTreeSet<Tag>, SourceError> {
        (**self).list_tags()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemorySource {
    series: BTreeMap<Tag, ScalarSeries>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, series: ScalarSeries) {
        self.series.insert(series.tag().to_owned(), series);
    }

    pub fn insert_samples(&mut self, tag: &str, samples: impl IntoIterator<Item = Sample>) {
        self.insert(ScalarSeries::from_unordered(tag, samples));
    }
}

impl ScalarSeriesSource for InMemorySource {
    fn fetch(&self, tag: &str) -> Result<ScalarSeries, SourceError> {
        Ok(lookup_series(&self.series, tag))
    }

    fn list_tags(&self) -> Result<BTreeSet<Tag>, SourceError> {
        Ok(self.series.keys().cloned().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagAvailability {
    pub present: Vec<Tag>,
    pub missing: Vec<Tag>,
}

/// Splits `requested` into tags the store holds and tags it lacks,
/// preserving request order.
pub fn available_tags(
    source: &dyn ScalarSeriesSource,
    requested: &[Tag],
) -> Result<TagAvailability, SourceError> {
    let listed = source.list_tags()?;
    let mut availability = TagAvailability::default();
    let mut seen = BTreeSet::new();
    for tag in requested {
        if !seen.insert(tag.as_str()) {
            continue;
        }
        if listed.contains(tag) {
            availability.present.push(tag.clone());
        } else {
            availability.missing.push(tag.clone());
        }
    }
    Ok(availability)
}

/// Opens a file-backed source, choosing the reader by extension.
pub fn open_source(path: impl AsRef<Path>) -> Result<Box<dyn ScalarSeriesSource>, SourceError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SourceError::Unavailable {
            path: path.to_path_buf(),
        });
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("csv") => Ok(Box::new(CsvSource::open(path)?)),
        Some("json") => Ok(Box::new(JsonScalarSource::open(path)?)),
        _ => Err(SourceError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

pub(crate) fn lookup_series(series: &BTreeMap<Tag, ScalarSeries>, tag: &str) -> ScalarSeries {
    match series.get(tag) {
        Some(found) => found.clone(),
        None => {
            tracing::debug!(tag, "tag not present in source, returning empty series");
            ScalarSeries::empty(tag)
        }
    }
}

pub(crate) fn ensure_exists(path: &Path) -> Result<(), SourceError> {
    if path.exists() {
        Ok(())
    } else {
        Err(SourceError::Unavailable {
            path: path.to_path_buf(),
        })
    }
}
