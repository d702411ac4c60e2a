use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use stepwise_config::{config_path, ensure_workspace_config, validate_config};

pub fn run_init_command(workspace: &Path, out: &mut dyn Write) -> Result<()> {
    let path = config_path(workspace);
    let existed = path.exists();

    let config = ensure_workspace_config(workspace)
        .with_context(|| format!("failed to load or create {}", path.display()))?;
    for warning in validate_config(&config) {
        eprintln!(
            "stepwise config warning [{}]: {}",
            warning.code, warning.message
        );
    }

    let status = if existed { "kept" } else { "created" };
    writeln!(out, "{status} {}", path.display()).context("failed to write init status")?;
    Ok(())
}
