//! Run command - executes the full stage pipeline
//!
//! Required capability: write access to the run directory and to the parent
//! of the working directory. Nothing here escalates privileges; a permission
//! failure aborts the run with the offending path.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::config::Overrides;
use crate::pipeline::{PipelineObserver, PipelineState, Promotion, RunReport, Step};
use crate::simulator::StageOutcome;

use super::common::load_pipeline;

/// Prints one line per step as the pipeline advances
struct ConsoleObserver {
    total: usize,
}

impl PipelineObserver for ConsoleObserver {
    fn step_started(&mut self, index: usize, step: &Step) {
        println!(
            "{} {} {}",
            "→".cyan().bold(),
            format!("[{}/{}]", index + 1, self.total).dimmed(),
            step
        );
    }

    fn step_finished(&mut self, state: &PipelineState) {
        if state.is_terminal() {
            println!("{} Pipeline complete", "✓".green().bold());
        }
    }

    fn stage_exited(&mut self, outcome: &StageOutcome) {
        let elapsed = format!("({:.1}s)", outcome.duration.as_secs_f64()).dimmed();
        if outcome.success {
            println!("  {} {} finished {}", "✓".green().bold(), outcome.stage, elapsed);
        } else {
            let code = outcome
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            println!(
                "  {} {} exited with {} {}",
                "!".yellow().bold(),
                outcome.stage,
                code.yellow(),
                elapsed
            );
        }
    }

    fn checkpoint_promoted(&mut self, promotion: &Promotion) {
        println!(
            "  {} {} {} {}",
            "✓".green().bold(),
            promotion.source.display(),
            "→".dimmed(),
            promotion.target.display()
        );
    }
}

/// Execute the run command
pub fn execute(config_path: Option<&Path>, overrides: &Overrides) -> Result<()> {
    let pipeline = load_pipeline(config_path, overrides)?;

    println!(
        "{} {} stages, working directory {}",
        "packrun".bold(),
        pipeline.config().stages.len(),
        pipeline.config().work_dir_path().display().to_string().dimmed()
    );

    let mut observer = ConsoleObserver {
        total: pipeline.steps().len(),
    };
    match pipeline.run(&mut observer) {
        Ok(report) => {
            print_summary(&report);
            Ok(())
        }
        Err(aborted) => {
            print_summary(&aborted.report);
            Err(aborted.into())
        }
    }
}

fn print_summary(report: &RunReport) {
    let failed = report.failed_stages();
    if failed.is_empty() {
        return;
    }

    println!(
        "{} {} stage(s) exited unsuccessfully or never started:",
        "!".yellow().bold(),
        failed.len()
    );
    for outcome in failed {
        println!("  {} {}", "-".dimmed(), outcome.stage);
    }
}
