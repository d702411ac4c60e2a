use std::ops::Range;

use serde::{Deserialize, Serialize};
use stepwise_core::{Step, TrailingSemantic};

use crate::{AlignedTable, AnalysisError};

/// How a window's rows were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowSelection {
    All,
    StepRange {
        low: Step,
        high: Option<Step>,
    },
    TrailingFraction {
        fraction: f64,
        semantic: TrailingSemantic,
    },
    TrailingRows {
        rows: usize,
    },
}

/// Contiguous row range of an aligned table.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    table: &'a AlignedTable,
    start: usize,
    end: usize,
    selection: WindowSelection,
}

impl<'a> Window<'a> {
    fn new(table: &'a AlignedTable, start: usize, end: usize, selection: WindowSelection) -> Self {
        let end = end.min(table.row_count());
        Self {
            table,
            start: start.min(end),
            end,
            selection,
        }
    }

    pub fn table(&self) -> &'a AlignedTable {
        self.table
    }

    pub fn selection(&self) -> WindowSelection {
        self.selection
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn row_count(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn steps(&self) -> &'a [Step] {
        &self.table.steps()[self.range()]
    }

    pub fn first_step(&self) -> Option<Step> {
        self.steps().first().copied()
    }

    pub fn last_step(&self) -> Option<Step> {
        self.steps().last().copied()
    }

    /// Cells of `tag` inside the window, or `None` if the table lacks the tag.
    pub fn values(&self, tag: &str) -> Option<&'a [Option<f64>]> {
        let range = self.range();
        self.table
            .column(tag)
            .map(|column| &column.values()[range])
    }
}

pub fn select_all(table: &AlignedTable) -> Window<'_> {
    Window::new(table, 0, table.row_count(), WindowSelection::All)
}

/// Rows with `low <= step <= high`; `high = None` leaves the range open.
pub fn select_by_step_range(
    table: &AlignedTable,
    low: Step,
    high: Option<Step>,
) -> Result<Window<'_>, AnalysisError> {
    if let Some(high) = high.filter(|high| *high < low) {
        return Err(AnalysisError::InvalidArgument(format!(
            "step range low {low} is above high {high}"
        )));
    }

    let steps = table.steps();
    let start = steps.partition_point(|step| *step < low);
    let end = match high {
        Some(high) => steps.partition_point(|step| *step <= high),
        None => steps.len(),
    };
    Ok(Window::new(
        table,
        start,
        end,
        WindowSelection::StepRange { low, high },
    ))
}

/// Trailing part of a run. `fraction` must lie in (0, 1].
pub fn select_by_trailing_fraction(
    table: &AlignedTable,
    fraction: f64,
    semantic: TrailingSemantic,
) -> Result<Window<'_>, AnalysisError> {
    validate_fraction(fraction)?;

    let rows = table.row_count();
    let start = match semantic {
        TrailingSemantic::ByStepValue => match table.max_step() {
            Some(max_step) => {
                let threshold = max_step as f64 * (1.0 - fraction);
                table
                    .steps()
                    .partition_point(|step| (*step as f64) < threshold)
            }
            None => 0,
        },
        TrailingSemantic::ByRowPosition => rows - trailing_row_count(rows, fraction),
    };

    Ok(Window::new(
        table,
        start,
        rows,
        WindowSelection::TrailingFraction { fraction, semantic },
    ))
}

/// The last `count` rows, or all rows when the table is shorter.
pub fn select_trailing_rows(table: &AlignedTable, count: usize) -> Result<Window<'_>, AnalysisError> {
    if count == 0 {
        return Err(AnalysisError::InvalidArgument(
            "trailing row count must be at least 1".to_owned(),
        ));
    }
    let rows = table.row_count();
    Ok(Window::new(
        table,
        rows.saturating_sub(count),
        rows,
        WindowSelection::TrailingRows { rows: count },
    ))
}

pub(crate) fn validate_fraction(fraction: f64) -> Result<(), AnalysisError> {
    if fraction.is_finite() && fraction > 0.0 && fraction <= 1.0 {
        Ok(())
    } else {
        Err(AnalysisError::InvalidArgument(format!(
            "trailing fraction must lie in (0, 1], got {fraction}"
        )))
    }
}

/// `ceil(rows * fraction)`, ignoring float noise such as `10 * 0.3 = 3.0000000000000004`.
fn trailing_row_count(rows: usize, fraction: f64) -> usize {
    if rows == 0 {
        return 0;
    }
    let exact = rows as f64 * fraction;
    let floor = exact.floor();
    let kept = if exact - floor <= 1e-9 * exact.max(1.0) {
        floor
    } else {
        floor + 1.0
    };
    (kept as usize).clamp(1, rows)
}
