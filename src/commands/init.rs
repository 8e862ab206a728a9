//! Init command - writes a commented packrun.toml

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{Config, DEFAULT_CONFIG_FILE};

/// Execute the init command in the current directory
pub fn execute(force: bool) -> Result<()> {
    let path = write_template(Path::new("."), force)?;
    println!(
        "{} Wrote {} {}",
        "✓".green().bold(),
        path.display(),
        "(set `workers` before running)".dimmed()
    );
    Ok(())
}

/// Write the config template into `dir`, refusing to clobber unless `force`.
pub fn write_template(dir: &Path, force: bool) -> Result<PathBuf> {
    let path = dir.join(DEFAULT_CONFIG_FILE);
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    fs::write(&path, Config::template())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
