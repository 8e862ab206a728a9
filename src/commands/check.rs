//! Check command - preflight checks before a long run
//!
//! Catches the cheap mistakes (missing deck, engine not on PATH, no worker
//! count) before hours of simulation are spent on the first stages.

use anyhow::{bail, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;

use crate::config::{Config, Overrides};

use super::common::load_config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckItem {
    pub label: String,
    pub ok: bool,
    pub detail: String,
}

impl CheckItem {
    fn pass(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ok: true,
            detail: detail.into(),
        }
    }

    fn fail(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Execute the check command
pub fn execute(config_path: Option<&Path>, overrides: &Overrides) -> Result<()> {
    let config = load_config(config_path, overrides)?;
    let items = collect(&config);

    for item in &items {
        let mark = if item.ok {
            "✓".green().bold()
        } else {
            "✗".red().bold()
        };
        println!("  {} {} {}", mark, item.label, item.detail.dimmed());
    }

    let failures = items.iter().filter(|i| !i.ok).count();
    if failures > 0 {
        bail!("{failures} check(s) failed");
    }
    Ok(())
}

/// Run every check against `config`
pub fn collect(config: &Config) -> Vec<CheckItem> {
    let mut items = Vec::new();

    items.push(match config.validate() {
        Ok(()) => CheckItem::pass("configuration", "valid"),
        Err(e) => CheckItem::fail("configuration", e.to_string()),
    });

    items.push(check_run_dir(&config.run_dir));

    if config.launcher.enabled {
        items.push(check_program("launcher", &config.launcher.program, config));
    }
    items.push(check_program("engine", &config.engine.program, config));

    for stage in &config.stages {
        let deck = config.resolve(&stage.deck);
        let label = format!("deck for '{}'", stage.name);
        items.push(if deck.is_file() {
            CheckItem::pass(label, deck.display().to_string())
        } else {
            CheckItem::fail(label, format!("{} not found", deck.display()))
        });
    }

    items
}

fn check_run_dir(run_dir: &Path) -> CheckItem {
    match fs::metadata(run_dir) {
        Ok(meta) if !meta.is_dir() => CheckItem::fail("run directory", "not a directory"),
        Ok(meta) if meta.permissions().readonly() => {
            CheckItem::fail("run directory", format!("{} is read-only", run_dir.display()))
        }
        Ok(_) => CheckItem::pass("run directory", run_dir.display().to_string()),
        Err(e) => CheckItem::fail("run directory", format!("{}: {e}", run_dir.display())),
    }
}

fn check_program(label: &str, program: &str, config: &Config) -> CheckItem {
    // Programs given with a path are resolved like the child process would
    if program.contains(std::path::MAIN_SEPARATOR) {
        let path = config.resolve(Path::new(program));
        return if path.is_file() {
            CheckItem::pass(label, path.display().to_string())
        } else {
            CheckItem::fail(label, format!("{} not found", path.display()))
        };
    }

    match which::which(program) {
        Ok(path) => CheckItem::pass(label, path.display().to_string()),
        Err(_) => CheckItem::fail(label, format!("'{program}' not found on PATH")),
    }
}
