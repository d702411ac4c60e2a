use std::path::Path;

use anyhow::{Context, Result};
use stepwise::align::run_align_command;
use stepwise::cli::{Cli, Commands, parse_cli};
use stepwise::compare::run_compare_command;
use stepwise::init::run_init_command;
use stepwise::logging::init_logging;
use stepwise::summarize::run_summarize_command;
use stepwise::tags::run_tags_command;
use stepwise_analysis::RunAnalyzer;
use stepwise_config::{config_path, load_workspace_config, validate_config};

fn main() -> Result<()> {
    let cli = parse_cli();
    init_logging(cli.log_format);
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let workspace = cli.workspace.canonicalize().with_context(|| {
        format!(
            "failed to resolve workspace path {}",
            cli.workspace.display()
        )
    })?;

    let mut out = std::io::stdout().lock();
    match cli.command {
        Commands::Init => run_init_command(&workspace, &mut out),
        Commands::Tags(args) => run_tags_command(&load_analyzer(&workspace)?, args, &mut out),
        Commands::Align(args) => run_align_command(&load_analyzer(&workspace)?, args, &mut out),
        Commands::Summarize(args) => {
            run_summarize_command(&load_analyzer(&workspace)?, args, &mut out)
        }
        Commands::Compare(args) => {
            run_compare_command(&load_analyzer(&workspace)?, args, &mut out)
        }
    }
}

fn load_analyzer(workspace: &Path) -> Result<RunAnalyzer> {
    let config = load_workspace_config(workspace).with_context(|| {
        format!(
            "failed to load workspace config at {}",
            config_path(workspace).display()
        )
    })?;
    for warning in validate_config(&config) {
        eprintln!(
            "stepwise config warning [{}]: {}",
            warning.code, warning.message
        );
    }
    Ok(RunAnalyzer::with_config(workspace, config))
}
