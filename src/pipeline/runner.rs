use std::path::PathBuf;
use thiserror::Error;

use crate::checkpoint;
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::simulator::{StageCommand, StageOutcome};
use crate::workdir;

use super::types::{PipelineState, Promotion, RunReport, Step};

/// Hooks for reporting progress. All methods default to no-ops.
pub trait PipelineObserver {
    fn step_started(&mut self, _index: usize, _step: &Step) {}
    fn step_finished(&mut self, _state: &PipelineState) {}
    fn stage_exited(&mut self, _outcome: &StageOutcome) {}
    fn checkpoint_promoted(&mut self, _promotion: &Promotion) {}
}

pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// A run that stopped before reaching `Terminal`
#[derive(Debug, Error)]
#[error("pipeline aborted at step {step_number} ({step}); last state {reached}")]
pub struct Aborted {
    pub reached: PipelineState,
    pub step: Step,
    pub step_number: usize,
    /// Everything that completed before the failing step
    pub report: RunReport,
    #[source]
    pub source: PipelineError,
}

pub struct Pipeline {
    config: Config,
    steps: Vec<Step>,
}

impl Pipeline {
    /// Validate `config` and lay out its steps in execution order.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let mut steps = vec![Step::EnsureWorkDir, Step::OpenPermissions];
        for (index, stage) in config.stages.iter().enumerate() {
            steps.push(Step::RunStage {
                index,
                name: stage.name.clone(),
            });
            if let Some(target) = &stage.promote_to {
                steps.push(Step::Promote {
                    stage: stage.name.clone(),
                    target: target.clone(),
                });
            }
        }

        Ok(Self { config, steps })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Resolved command line of every stage, in order
    pub fn stage_commands(&self) -> Result<Vec<StageCommand>> {
        self.config
            .stages
            .iter()
            .map(|stage| StageCommand::build(&self.config, stage))
            .collect()
    }

    /// Execute every step in order, stopping at the first error.
    pub fn run(
        &self,
        observer: &mut dyn PipelineObserver,
    ) -> std::result::Result<RunReport, Aborted> {
        let mut state = PipelineState::Init;
        let mut report = RunReport::default();

        for (index, step) in self.steps.iter().enumerate() {
            tracing::info!(step = index + 1, total = self.steps.len(), "{step}");
            observer.step_started(index, step);

            if let Err(source) = self.execute(step, &mut report, observer) {
                tracing::error!(state = %state, error = %source, "pipeline aborted");
                return Err(Aborted {
                    reached: state,
                    step: step.clone(),
                    step_number: index + 1,
                    report,
                    source,
                });
            }

            state = PipelineState::after(step);
            tracing::debug!(state = %state, "step complete");
            observer.step_finished(&state);
        }

        state = PipelineState::Terminal;
        observer.step_finished(&state);
        tracing::info!(
            stages = report.outcomes.len(),
            promotions = report.promotions.len(),
            "pipeline finished"
        );

        Ok(report)
    }

    fn execute(
        &self,
        step: &Step,
        report: &mut RunReport,
        observer: &mut dyn PipelineObserver,
    ) -> Result<()> {
        let work_dir = self.config.work_dir_path();

        match step {
            Step::EnsureWorkDir => workdir::ensure_work_dir(&work_dir),
            Step::OpenPermissions => workdir::open_permissions(&work_dir, self.config.work_dir_mode),
            Step::RunStage { index, .. } => {
                let stage = self.config.stages.get(*index).ok_or_else(|| {
                    PipelineError::Config(format!("no stage at position {index}"))
                })?;
                let outcome = match StageCommand::build(&self.config, stage)?.run() {
                    Ok(outcome) => outcome,
                    // A shell would report these as a non-zero exit
                    Err(e @ (PipelineError::DeckMissing { .. } | PipelineError::Spawn { .. }))
                        if !self.config.fail_fast =>
                    {
                        tracing::warn!(stage = %stage.name, error = %e, "stage could not start");
                        StageOutcome::not_started(&stage.name)
                    }
                    Err(e) => return Err(e),
                };
                observer.stage_exited(&outcome);
                let failed = !outcome.success;
                let exit_code = outcome.exit_code;
                report.outcomes.push(outcome);

                if failed {
                    if self.config.fail_fast {
                        return Err(PipelineError::StageFailed {
                            stage: stage.name.clone(),
                            code: exit_code,
                        });
                    }
                    tracing::warn!(
                        stage = %stage.name,
                        code = ?exit_code,
                        "stage exited unsuccessfully, continuing"
                    );
                }
                Ok(())
            }
            Step::Promote { stage, target } => {
                let target_path: PathBuf = self.config.resolve(target);
                let source = checkpoint::promote_newest(
                    &work_dir,
                    &self.config.checkpoint_pattern,
                    &target_path,
                )?;
                tracing::info!(
                    from = %source.display(),
                    to = %target_path.display(),
                    "checkpoint promoted"
                );

                let promotion = Promotion {
                    stage: stage.clone(),
                    source,
                    target: target_path,
                };
                observer.checkpoint_promoted(&promotion);
                report.promotions.push(promotion);
                Ok(())
            }
        }
    }
}
