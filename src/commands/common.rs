//! Shared helpers for command handlers

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::{Config, Overrides};
use crate::pipeline::Pipeline;

/// Load the config (explicit file, discovered `packrun.toml`, or defaults)
/// and apply command-line overrides. Does not validate.
pub fn load_config(config_path: Option<&Path>, overrides: &Overrides) -> Result<Config> {
    let config = Config::load_or_default(config_path, Path::new("."))?;
    Ok(config.apply(overrides))
}

/// Load, override and validate, producing a ready-to-run pipeline.
pub fn load_pipeline(config_path: Option<&Path>, overrides: &Overrides) -> Result<Pipeline> {
    let config = load_config(config_path, overrides)?;
    Pipeline::from_config(config).context("Invalid configuration")
}
