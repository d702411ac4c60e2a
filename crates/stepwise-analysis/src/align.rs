use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use stepwise_core::{Sample, ScalarSeries, Step, Tag};
use stepwise_source::{ScalarSeriesSource, SourceError};

use crate::AnalysisError;

/// One tag's values resolved onto the shared step axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedColumn {
    tag: Tag,
    values: Vec<Option<f64>>,
}

impl AlignedColumn {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|value| value.is_some()).count()
    }
}

/// Rectangular table of forward-filled tag columns keyed by ascending step.
///
/// Every column has exactly one cell per step. A cell is `None` only for
/// steps before the tag's first sample.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AlignedTable {
    steps: Vec<Step>,
    columns: Vec<AlignedColumn>,
}

impl AlignedTable {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn columns(&self) -> &[AlignedColumn] {
        &self.columns
    }

    pub fn column(&self, tag: &str) -> Option<&AlignedColumn> {
        self.columns.iter().find(|column| column.tag == tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|column| column.tag.as_str())
    }

    pub fn row_count(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn first_step(&self) -> Option<Step> {
        self.steps.first().copied()
    }

    pub fn max_step(&self) -> Option<Step> {
        self.steps.last().copied()
    }

    pub fn value(&self, row: usize, tag: &str) -> Option<f64> {
        self.column(tag)
            .and_then(|column| column.values.get(row).copied().flatten())
    }

    /// Rows as `(step, cells)` with cells in column order.
    pub fn rows(&self) -> impl Iterator<Item = (Step, Vec<Option<f64>>)> + '_ {
        self.steps.iter().enumerate().map(|(row, step)| {
            let cells = self
                .columns
                .iter()
                .map(|column| column.values[row])
                .collect();
            (*step, cells)
        })
    }
}

impl ScalarSeriesSource for AlignedTable {
    fn fetch(&self, tag: &str) -> Result<ScalarSeries, SourceError> {
        let Some(column) = self.column(tag) else {
            return Ok(ScalarSeries::empty(tag));
        };
        let samples = self
            .steps
            .iter()
            .zip(&column.values)
            .filter_map(|(step, value)| value.map(|value| Sample::new(*step, value)))
            .collect();
        Ok(ScalarSeries::new(tag, samples)?)
    }

    fn list_tags(&self) -> Result<BTreeSet<Tag>, SourceError> {
        Ok(self.tags().map(str::to_owned).collect())
    }
}

/// Fetches `tags` from `source` and aligns them on the union of their steps.
pub fn align(tags: &[Tag], source: &dyn ScalarSeriesSource) -> Result<AlignedTable, AnalysisError> {
    let mut seen = HashSet::new();
    let mut series = Vec::with_capacity(tags.len());
    for tag in tags {
        if !seen.insert(tag.as_str()) {
            continue;
        }
        series.push(source.fetch(tag)?);
    }
    Ok(align_series(&series))
}

/// Aligns already fetched series. Each series is merged against the axis
/// with a single forward cursor, so the cost is linear in axis length per tag.
pub fn align_series(series: &[ScalarSeries]) -> AlignedTable {
    let axis: BTreeSet<Step> = series.iter().flat_map(|entry| entry.steps()).collect();
    let steps: Vec<Step> = axis.into_iter().collect();

    let columns = series
        .iter()
        .map(|entry| AlignedColumn {
            tag: entry.tag().to_owned(),
            values: forward_fill(entry.samples(), &steps),
        })
        .collect();

    AlignedTable { steps, columns }
}

fn forward_fill(samples: &[Sample], steps: &[Step]) -> Vec<Option<f64>> {
    let mut values = Vec::with_capacity(steps.len());
    let mut cursor = 0usize;
    let mut current: Option<f64> = None;
    for step in steps {
        // The axis contains every sample step, so the cursor never skips one.
        if let Some(sample) = samples.get(cursor).filter(|sample| sample.step == *step) {
            current = Some(sample.value);
            cursor += 1;
        }
        values.push(current);
    }
    values
}
