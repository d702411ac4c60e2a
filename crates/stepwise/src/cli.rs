use std::ffi::OsStr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use stepwise_analysis::RunInput;
use stepwise_core::{TagCategory, TrailingSemantic};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid log format '{other}', expected one of: human, json"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Table => "table",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "json" => Ok(Self::Json),
            "table" => Ok(Self::Table),
            other => Err(format!(
                "invalid output format '{other}', expected one of: json, table"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct TagsArgs {
    #[arg(help = "CSV or JSON scalar export")]
    pub input: PathBuf,

    #[arg(
        long,
        value_parser = parse_category,
        help = "Only list tags of this category: performance, training, or policy"
    )]
    pub category: Option<TagCategory>,

    #[arg(
        long,
        default_value = "table",
        value_parser = parse_output_format,
        help = "Output format: table or json"
    )]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct AlignArgs {
    #[arg(help = "CSV or JSON scalar export")]
    pub input: PathBuf,

    #[arg(
        long,
        value_delimiter = ',',
        value_name = "TAG",
        help = "Comma-separated tags to align (defaults to the configured tags)"
    )]
    pub tags: Vec<String>,

    #[arg(long, help = "Write the aligned CSV here instead of stdout")]
    pub output: Option<PathBuf>,
}

/// Window options shared by `summarize` and `compare`.
#[derive(Debug, Clone, PartialEq, Args)]
pub struct WindowArgs {
    #[arg(
        long,
        value_delimiter = ',',
        value_name = "TAG",
        help = "Comma-separated tags to summarize (defaults to the configured tags)"
    )]
    pub tags: Vec<String>,

    #[arg(long, help = "Trailing fraction of the run used as the final window, in (0, 1]")]
    pub final_fraction: Option<f64>,

    #[arg(
        long,
        value_parser = parse_semantic,
        help = "Final window semantic: by_step_value or by_row_position"
    )]
    pub final_semantic: Option<TrailingSemantic>,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct SummarizeArgs {
    #[arg(help = "CSV or JSON scalar export")]
    pub input: PathBuf,

    #[arg(long, help = "Run identifier (defaults to the input file stem)")]
    pub run_id: Option<String>,

    #[command(flatten)]
    pub window: WindowArgs,

    #[arg(long, help = "Also summarize the last N rows")]
    pub last_rows: Option<usize>,

    #[arg(long, help = "Skip the configured phase windows")]
    pub no_phases: bool,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct CompareArgs {
    #[arg(
        long = "run",
        value_name = "NAME=PATH",
        value_parser = parse_run_input,
        required = true,
        help = "Run to compare; repeat for several runs"
    )]
    pub runs: Vec<RunInput>,

    #[command(flatten)]
    pub window: WindowArgs,

    #[arg(
        long,
        conflicts_with = "overall",
        help = "Compare the last N rows of each run instead of the final window"
    )]
    pub last_rows: Option<usize>,

    #[arg(long, help = "Compare whole runs instead of the final window")]
    pub overall: bool,

    #[arg(long, help = "Leave configured baselines out of the table")]
    pub no_baselines: bool,

    #[arg(
        long,
        default_value = "json",
        value_parser = parse_output_format,
        help = "Output format: json or table"
    )]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Commands {
    /// Write the default .stepwise/config.toml when none exists
    Init,
    /// List the tags stored in a scalar export
    Tags(TagsArgs),
    /// Align tags on a shared step axis and write the table as CSV
    Align(AlignArgs),
    /// Summarize one run over its overall, final and phase windows
    Summarize(SummarizeArgs),
    /// Compare runs and configured baselines in one table
    Compare(CompareArgs),
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Training run metric alignment and summaries")]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = ".",
        help = "Workspace root holding .stepwise/config.toml"
    )]
    pub workspace: PathBuf,

    #[arg(
        long,
        global = true,
        default_value = "human",
        value_parser = parse_log_format,
        help = "Log format: human or json"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

pub fn parse_cli() -> Cli {
    let mut args: Vec<_> = std::env::args_os().collect();
    if args.get(1).is_some_and(|arg| arg == OsStr::new("--")) {
        args.remove(1);
    }

    Cli::parse_from(args)
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse()
}

fn parse_output_format(value: &str) -> Result<OutputFormat, String> {
    value.parse()
}

fn parse_category(value: &str) -> Result<TagCategory, String> {
    value.parse()
}

fn parse_semantic(value: &str) -> Result<TrailingSemantic, String> {
    value.parse()
}

fn parse_run_input(value: &str) -> Result<RunInput, String> {
    let (name, path) = value
        .split_once('=')
        .ok_or_else(|| format!("invalid run '{value}', expected NAME=PATH"))?;
    let name = name.trim();
    let path = path.trim();
    if name.is_empty() || path.is_empty() {
        return Err(format!("invalid run '{value}', expected NAME=PATH"));
    }

    Ok(RunInput {
        run_id: name.to_owned(),
        path: PathBuf::from(path),
    })
}
