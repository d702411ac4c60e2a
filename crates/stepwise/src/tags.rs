use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;
use stepwise_analysis::RunAnalyzer;
use stepwise_core::{Tag, TagCategory};
use stepwise_source::open_source;

use crate::cli::{OutputFormat, TagsArgs};
use crate::output::{normalize_field, write_json};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagEntry {
    pub tag: Tag,
    pub category: Option<TagCategory>,
}

pub fn run_tags_command(analyzer: &RunAnalyzer, args: TagsArgs, out: &mut dyn Write) -> Result<()> {
    let path = analyzer.resolve_path(&args.input);
    let source =
        open_source(&path).with_context(|| format!("failed to open {}", path.display()))?;
    let tags = source
        .list_tags()
        .with_context(|| format!("failed to list tags in {}", path.display()))?;
    let entries = tag_entries(tags, args.category);

    match args.format {
        OutputFormat::Json => write_json(&entries, out),
        OutputFormat::Table => write_tag_table(&entries, out).context("failed to write tag table"),
    }
}

pub fn tag_entries(
    tags: impl IntoIterator<Item = Tag>,
    category: Option<TagCategory>,
) -> Vec<TagEntry> {
    tags.into_iter()
        .map(|tag| TagEntry {
            category: TagCategory::of_tag(&tag),
            tag,
        })
        .filter(|entry| category.is_none() || entry.category == category)
        .collect()
}

pub fn write_tag_table(entries: &[TagEntry], out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "tag\tcategory")?;
    for entry in entries {
        writeln!(
            out,
            "{}\t{}",
            normalize_field(&entry.tag),
            entry.category.map_or("-", TagCategory::as_str)
        )?;
    }
    Ok(())
}
