//! Error taxonomy for the stage pipeline
//!
//! Library code returns [`PipelineError`] so callers can tell a missing
//! checkpoint apart from a filesystem or launcher problem. Command handlers
//! wrap these in `anyhow` with extra context.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The checkpoint pattern matched nothing at a promotion step.
    #[error("no checkpoint matching '{pattern}' found in {}", .dir.display())]
    NoCheckpointFound { dir: PathBuf, pattern: String },

    #[error("invalid checkpoint pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Only raised when `fail_fast` is enabled.
    #[error("stage '{stage}' exited with {}", describe_code(.code))]
    StageFailed { stage: String, code: Option<i32> },

    #[error("stage '{stage}' killed after {}s timeout", .timeout.as_secs())]
    StageTimedOut { stage: String, timeout: Duration },

    #[error("failed to launch '{program}' for stage '{stage}'")]
    Spawn {
        stage: String,
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed while waiting for stage '{stage}'")]
    Wait {
        stage: String,
        #[source]
        source: io::Error,
    },

    #[error("input deck for stage '{stage}' not found: {}", .deck.display())]
    DeckMissing { stage: String, deck: PathBuf },

    #[error("failed to {op} {}", .path.display())]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub(crate) fn fs(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        PipelineError::Filesystem {
            op,
            path: path.into(),
            source,
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "no status (terminated by signal)".to_string(),
    }
}
