//! Plan command - shows what a run would do without executing anything

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::config::Overrides;
use crate::pipeline::{Pipeline, Step};

use super::common::load_pipeline;

/// Execute the plan command
pub fn execute(config_path: Option<&Path>, overrides: &Overrides) -> Result<()> {
    let pipeline = load_pipeline(config_path, overrides)?;
    for line in render(&pipeline)? {
        println!("{line}");
    }
    Ok(())
}

/// One line per step, with resolved command lines for stages
pub fn render(pipeline: &Pipeline) -> Result<Vec<String>> {
    let config = pipeline.config();
    let commands = pipeline.stage_commands()?;
    let work_dir = config.work_dir_path();

    let lines = pipeline
        .steps()
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let number = format!("{:>2}.", i + 1);
            let detail = match step {
                Step::EnsureWorkDir => format!("mkdir -p {}", work_dir.display()),
                Step::OpenPermissions => {
                    format!("chmod {:o} {}", config.work_dir_mode, work_dir.display())
                }
                Step::RunStage { index, .. } => commands
                    .get(*index)
                    .map(|c| c.to_string())
                    .unwrap_or_default(),
                Step::Promote { target, .. } => format!(
                    "mv <newest {}> {}",
                    work_dir.join(&config.checkpoint_pattern).display(),
                    config.resolve(target).display()
                ),
            };
            format!("{} {}\n    {}", number.dimmed(), step, detail.dimmed())
        })
        .collect();

    Ok(lines)
}
