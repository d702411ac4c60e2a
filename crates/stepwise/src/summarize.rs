use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use stepwise_analysis::{RunAnalyzer, RunReportRequest};
use stepwise_source::open_source;

use crate::cli::{SummarizeArgs, WindowArgs};
use crate::output::write_json;

pub fn run_summarize_command(
    analyzer: &RunAnalyzer,
    args: SummarizeArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let run_id = args
        .run_id
        .clone()
        .unwrap_or_else(|| run_id_from_path(&args.input));
    let path = analyzer.resolve_path(&args.input);
    let source = open_source(&path)
        .with_context(|| format!("failed to open run '{run_id}' at {}", path.display()))?;

    let request = RunReportRequest {
        last_rows: args.last_rows,
        skip_phases: args.no_phases,
        ..report_request(args.window)
    };
    let report = analyzer
        .report(&run_id, source.as_ref(), &request)
        .with_context(|| format!("failed to summarize run '{run_id}'"))?;
    write_json(&report, out)
}

pub(crate) fn report_request(window: WindowArgs) -> RunReportRequest {
    RunReportRequest {
        tags: (!window.tags.is_empty()).then_some(window.tags),
        final_fraction: window.final_fraction,
        final_semantic: window.final_semantic,
        ..RunReportRequest::default()
    }
}

fn run_id_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
