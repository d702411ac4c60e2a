mod align;
mod compare;
mod error;
mod pipeline;
mod summary;
mod window;

pub use align::{AlignedColumn, AlignedTable, align, align_series};
pub use compare::{
    COMPARISON_SCHEMA_VERSION, ComparisonCell, ComparisonRow, ComparisonTable, PolicyOrigin,
    PolicySummary, SchemaMismatch, assemble,
};
pub use error::{AnalysisError, AnalysisWarning, WarningCode};
pub use pipeline::{
    CompareRequest, CompareWindow, ComparisonReport, FINAL_WINDOW, FailedRun, LAST_ROWS_WINDOW,
    OVERALL_WINDOW, REPORT_SCHEMA_VERSION, RunAnalyzer, RunInput, RunOutcome, RunReport,
    RunReportRequest, WindowReport,
};
pub use summary::{
    BestSample, DerivedIndicators, MetricSummary, best_of, collision_rate_percent,
    success_rate_percent, summarize, summarize_values, worst_of,
};
pub use window::{
    Window, WindowSelection, select_all, select_by_step_range, select_by_trailing_fraction,
    select_trailing_rows,
};
