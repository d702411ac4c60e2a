use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use stepwise_core::{STEP_COLUMN, Sample, ScalarSeries, Step, Tag};

use crate::{ScalarSeriesSource, SourceError, ensure_exists, lookup_series};

/// Flat table with a `step` column and one column per tag.
///
/// The file is read once at open. A cell that is empty, non-numeric or
/// non-finite is skipped for its own tag only. Rows without a usable step are
/// skipped entirely.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    series: BTreeMap<Tag, ScalarSeries>,
    skipped_rows: usize,
}

impl CsvSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        ensure_exists(path)?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)?;
        let headers = reader.headers()?.clone();

        let step_index = headers
            .iter()
            .position(|name| name == STEP_COLUMN)
            .ok_or_else(|| SourceError::MissingStepColumn {
                path: path.to_path_buf(),
                column: STEP_COLUMN,
            })?;

        let mut columns: Vec<(usize, Tag)> = Vec::new();
        let mut seen = BTreeSet::new();
        for (index, name) in headers.iter().enumerate() {
            if index == step_index || name.is_empty() {
                continue;
            }
            if !seen.insert(name.to_owned()) {
                tracing::warn!(
                    path = %path.display(),
                    column = name,
                    "duplicate csv column, keeping the first occurrence"
                );
                continue;
            }
            columns.push((index, name.to_owned()));
        }

        let mut samples: BTreeMap<Tag, Vec<Sample>> = columns
            .iter()
            .map(|(_, tag)| (tag.clone(), Vec::new()))
            .collect();
        let mut skipped_rows = 0usize;

        for record in reader.records() {
            let record = record?;
            let Some(step) = record.get(step_index).and_then(parse_step) else {
                skipped_rows += 1;
                continue;
            };

            for (index, tag) in &columns {
                let Some(value) = record.get(*index).and_then(parse_value) else {
                    continue;
                };
                if let Some(tag_samples) = samples.get_mut(tag) {
                    tag_samples.push(Sample::new(step, value));
                }
            }
        }

        if skipped_rows > 0 {
            tracing::warn!(
                path = %path.display(),
                skipped_rows,
                "skipped csv rows without a valid step"
            );
        }

        let series = samples
            .into_iter()
            .map(|(tag, tag_samples)| {
                let series = ScalarSeries::from_unordered(tag.clone(), tag_samples);
                (tag, series)
            })
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            series,
            skipped_rows,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}

impl ScalarSeriesSource for CsvSource {
    fn fetch(&self, tag: &str) -> Result<ScalarSeries, SourceError> {
        Ok(lookup_series(&self.series, tag))
    }

    fn list_tags(&self) -> Result<BTreeSet<Tag>, SourceError> {
        Ok(self.series.keys().cloned().collect())
    }
}

fn parse_step(raw: &str) -> Option<Step> {
    if let Ok(step) = raw.parse::<Step>() {
        return Some(step);
    }
    // Exporters sometimes write integral steps as floats ("1000.0").
    let value = raw.parse::<f64>().ok()?;
    let integral = value.is_finite() && value >= 0.0 && value.fract() == 0.0;
    (integral && value <= Step::MAX as f64).then_some(value as Step)
}

fn parse_value(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}
