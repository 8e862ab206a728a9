use std::fmt;
use std::path::PathBuf;

use crate::simulator::StageOutcome;

/// One unit of work in the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    EnsureWorkDir,
    OpenPermissions,
    /// Run the stage at `index` in the configured stage list
    RunStage { index: usize, name: String },
    /// Move the newest checkpoint to `target` (relative to the run directory)
    Promote { stage: String, target: PathBuf },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::EnsureWorkDir => write!(f, "create working directory"),
            Step::OpenPermissions => write!(f, "open working directory permissions"),
            Step::RunStage { name, .. } => write!(f, "run stage '{name}'"),
            Step::Promote { stage, target } => {
                write!(f, "promote '{stage}' checkpoint to {}", target.display())
            }
        }
    }
}

/// Progress through the pipeline.
///
/// The chain is linear:
/// `Init` → `DirReady` → `PermSet` → (`StageDone` | `Promoted`)* → `Terminal`.
/// Each completed step moves to exactly one successor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    DirReady,
    PermSet,
    StageDone(String),
    Promoted(PathBuf),
    Terminal,
}

impl PipelineState {
    /// State reached once `step` has completed
    pub fn after(step: &Step) -> Self {
        match step {
            Step::EnsureWorkDir => PipelineState::DirReady,
            Step::OpenPermissions => PipelineState::PermSet,
            Step::RunStage { name, .. } => PipelineState::StageDone(name.clone()),
            Step::Promote { target, .. } => PipelineState::Promoted(target.clone()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Terminal)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Init => write!(f, "Init"),
            PipelineState::DirReady => write!(f, "DirReady"),
            PipelineState::PermSet => write!(f, "PermSet"),
            PipelineState::StageDone(name) => write!(f, "StageDone({name})"),
            PipelineState::Promoted(target) => write!(f, "Promoted({})", target.display()),
            PipelineState::Terminal => write!(f, "Terminal"),
        }
    }
}

/// A checkpoint that was moved out of the working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub stage: String,
    pub source: PathBuf,
    pub target: PathBuf,
}

/// Summary of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub outcomes: Vec<StageOutcome>,
    pub promotions: Vec<Promotion>,
}

impl RunReport {
    /// Stages that exited non-zero but were allowed to continue
    pub fn failed_stages(&self) -> Vec<&StageOutcome> {
        self.outcomes.iter().filter(|o| !o.success).collect()
    }
}
