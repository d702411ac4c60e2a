use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use stepwise_core::{Sample, ScalarSeries, Tag};

use crate::{ScalarSeriesSource, SourceError, ensure_exists, lookup_series};

/// Scalar dump exported from an event log:
/// `{"Reward": [{"step": 0, "value": 1.5}, ...], ...}`.
#[derive(Debug, Clone)]
pub struct JsonScalarSource {
    path: PathBuf,
    series: BTreeMap<Tag, ScalarSeries>,
}

impl JsonScalarSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        ensure_exists(path)?;

        let raw = fs::read_to_string(path)?;
        let series = parse_scalar_dump(&raw)?;
        Ok(Self {
            path: path.to_path_buf(),
            series,
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, SourceError> {
        Ok(Self {
            path: PathBuf::new(),
            series: parse_scalar_dump(raw)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScalarSeriesSource for JsonScalarSource {
    fn fetch(&self, tag: &str) -> Result<ScalarSeries, SourceError> {
        Ok(lookup_series(&self.series, tag))
    }

    fn list_tags(&self) -> Result<BTreeSet<Tag>, SourceError> {
        Ok(self.series.keys().cloned().collect())
    }
}

fn parse_scalar_dump(raw: &str) -> Result<BTreeMap<Tag, ScalarSeries>, SourceError> {
    // serde_json cannot represent NaN, so every parsed value is finite.
    let parsed: BTreeMap<Tag, Vec<Sample>> = serde_json::from_str(raw)?;
    Ok(parsed
        .into_iter()
        .map(|(tag, samples)| {
            let series = ScalarSeries::from_unordered(tag.clone(), samples);
            (tag, series)
        })
        .collect())
}
