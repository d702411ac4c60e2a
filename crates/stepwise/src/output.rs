use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

pub fn write_json(value: &impl Serialize, out: &mut dyn Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("failed to serialize JSON output")?;
    writeln!(out).context("failed to write trailing newline")?;
    Ok(())
}

pub(crate) fn normalize_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}
