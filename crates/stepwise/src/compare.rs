use std::io::Write;

use anyhow::{Context, Result, bail};
use stepwise_analysis::{
    CompareRequest, CompareWindow, ComparisonCell, ComparisonTable, PolicyOrigin, RunAnalyzer,
};

use crate::cli::{CompareArgs, OutputFormat};
use crate::output::{normalize_field, write_json};
use crate::summarize::report_request;

pub fn run_compare_command(
    analyzer: &RunAnalyzer,
    args: CompareArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let window = match (args.overall, args.last_rows) {
        (true, _) => CompareWindow::Overall,
        (false, Some(rows)) => CompareWindow::LastRows(rows),
        (false, None) => CompareWindow::Final,
    };
    let request = CompareRequest {
        report: report_request(args.window),
        window,
        include_baselines: !args.no_baselines,
    };

    let report = analyzer
        .compare(&args.runs, &request)
        .context("comparison failed")?;
    for failed in &report.failed_runs {
        eprintln!("stepwise: skipped run '{}': {}", failed.run_id, failed.error);
    }
    if report.failed_runs.len() == args.runs.len() {
        bail!("none of the {} requested runs could be summarized", args.runs.len());
    }

    match args.format {
        OutputFormat::Json => write_json(&report, out),
        OutputFormat::Table => {
            write_comparison_table(&report.table, out).context("failed to write comparison table")
        }
    }
}

/// Tab-separated table with one `mean±std` cell per metric. Missing metrics
/// print `n/a`; metrics with zero samples print `no data`.
pub fn write_comparison_table(table: &ComparisonTable, out: &mut dyn Write) -> std::io::Result<()> {
    write!(out, "policy\torigin")?;
    for metric in &table.metrics {
        write!(out, "\t{}", normalize_field(metric))?;
    }
    writeln!(out, "\tcollision_rate_percent\tsuccess_rate_percent")?;

    for row in &table.rows {
        let origin = match row.origin {
            PolicyOrigin::Baseline => "baseline",
            PolicyOrigin::Computed { .. } => "computed",
        };
        write!(out, "{}\t{origin}", normalize_field(&row.policy))?;
        for metric in &table.metrics {
            write!(out, "\t{}", format_cell(row.cells.get(metric)))?;
        }
        writeln!(
            out,
            "\t{}\t{}",
            format_rate(row.derived.collision_rate_percent),
            format_rate(row.derived.success_rate_percent)
        )?;
    }
    Ok(())
}

fn format_cell(cell: Option<&ComparisonCell>) -> String {
    match cell.and_then(ComparisonCell::summary) {
        None => "n/a".to_owned(),
        Some(summary) => match (summary.mean, summary.std) {
            (Some(mean), Some(std)) => format!("{mean:.2}±{std:.2}"),
            _ => "no data".to_owned(),
        },
    }
}

fn format_rate(rate: Option<f64>) -> String {
    rate.map_or_else(|| "n/a".to_owned(), |rate| format!("{rate:.1}"))
}
