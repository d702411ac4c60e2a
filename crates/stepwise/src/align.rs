use std::fs::File;
use std::io::Write;

use anyhow::{Context, Result};
use stepwise_analysis::{AlignedTable, RunAnalyzer, RunReportRequest};
use stepwise_core::STEP_COLUMN;
use stepwise_source::open_source;

use crate::cli::AlignArgs;

pub fn run_align_command(
    analyzer: &RunAnalyzer,
    args: AlignArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let path = analyzer.resolve_path(&args.input);
    let source =
        open_source(&path).with_context(|| format!("failed to open {}", path.display()))?;
    let request = RunReportRequest {
        tags: (!args.tags.is_empty()).then_some(args.tags),
        ..RunReportRequest::default()
    };
    let table = analyzer
        .align_source(source.as_ref(), &request)
        .context("alignment failed")?;

    match args.output {
        Some(output) => {
            let file = File::create(&output)
                .with_context(|| format!("failed to create {}", output.display()))?;
            write_aligned_csv(&table, file)?;
            tracing::info!(
                path = %output.display(),
                rows = table.row_count(),
                "wrote aligned table"
            );
            Ok(())
        }
        None => write_aligned_csv(&table, out),
    }
}

/// Writes `step` followed by one column per tag. Undefined cells stay empty.
pub fn write_aligned_csv<W: Write>(table: &AlignedTable, writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    let header: Vec<&str> = std::iter::once(STEP_COLUMN).chain(table.tags()).collect();
    writer
        .write_record(&header)
        .context("failed to write CSV header")?;

    for (step, cells) in table.rows() {
        let record: Vec<String> = std::iter::once(step.to_string())
            .chain(
                cells
                    .iter()
                    .map(|cell| cell.map(|value| value.to_string()).unwrap_or_default()),
            )
            .collect();
        writer
            .write_record(&record)
            .with_context(|| format!("failed to write CSV row for step {step}"))?;
    }

    writer.flush().context("failed to flush CSV output")?;
    Ok(())
}
